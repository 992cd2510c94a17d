//! Mock duplex stream for testing without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::StreamPort;
use crate::stream::DuplexStream;
use crate::{AudioRelayError, RelayConfig};

/// A manually-stepped duplex stream.
///
/// Instead of a hardware clock, the test drives completions explicitly:
/// one call to [`complete_capture`](MockDuplex::complete_capture) is one
/// capture period, one call to
/// [`complete_playback`](MockDuplex::complete_playback) is one playback
/// period. This makes the full pipeline testable deterministically in CI.
///
/// The mock is a cheap cloneable handle, so a test can keep a copy for
/// stepping while the session owns the original:
///
/// ```ignore
/// let mut handle = None;
/// let (session, worker) = AudioRelay::builder()
///     .encoder(PcmPassthrough)
///     .build(|port| {
///         let mock = MockDuplex::connect(port, &config);
///         handle = Some(mock.clone());
///         Ok(mock)
///     })?;
/// let mock = handle.unwrap();
/// mock.complete_capture(&[0u8; 128])?;
/// ```
#[derive(Clone)]
pub struct MockDuplex {
    inner: Arc<MockInner>,
}

struct MockInner {
    port: StreamPort,
    buffer_bytes: usize,
    running: AtomicBool,
}

impl MockDuplex {
    /// Creates a mock stream wired to the given port.
    #[must_use]
    pub fn connect(port: StreamPort, config: &RelayConfig) -> Self {
        Self {
            inner: Arc::new(MockInner {
                port,
                buffer_bytes: config.buffer_bytes,
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Returns `true` while the clocks are started.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Simulates one finished capture period delivering `block`.
    ///
    /// A no-op while the clocks are stopped, like real hardware.
    ///
    /// # Errors
    ///
    /// Propagates fatal handler errors (exhaustion, size mismatch).
    pub fn complete_capture(&self, block: &[u8]) -> Result<(), AudioRelayError> {
        if !self.is_running() {
            return Ok(());
        }
        self.inner.port.capture_complete(block)
    }

    /// Simulates one finished playback period and returns the block the
    /// hardware would have output next (silence on underrun or while
    /// stopped).
    ///
    /// # Errors
    ///
    /// Propagates fatal handler errors (size mismatch).
    pub fn complete_playback(&self) -> Result<Vec<u8>, AudioRelayError> {
        let mut out = vec![0u8; self.inner.buffer_bytes];
        if self.is_running() {
            self.inner.port.playback_complete(&mut out)?;
        }
        Ok(out)
    }

    /// Simulates a hardware error notification.
    pub fn inject_error(&self, reason: &str) {
        self.inner.port.stream_error(reason);
    }
}

impl DuplexStream for MockDuplex {
    fn start_clocks(&mut self) -> Result<(), AudioRelayError> {
        self.inner.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_clocks(&mut self) -> Result<(), AudioRelayError> {
        self.inner.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
