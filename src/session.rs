//! Relay session management.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::pipeline::PipelineContext;
use crate::pool::PoolCensus;
use crate::stream::DuplexStream;
use crate::AudioRelayError;

/// Statistics about a relay session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Capture completions accepted into Pending-Treatment.
    pub captures: u64,
    /// Transactions encoded and dispatched by the worker.
    pub treatments: u64,
    /// Successful transport sends.
    pub transport_sends: u64,
    /// Transport sends given up after exhausting attempts.
    pub transport_failures: u64,
    /// Playback periods that output silence for lack of a ready block.
    pub playback_underruns: u64,
}

/// Handle to a running relay pipeline.
///
/// Returned by [`AudioRelayBuilder::build()`] / [`start()`]. The hardware
/// rotates buffers and the worker treats them until [`stop()`](Session::stop)
/// is called or the session is dropped.
///
/// # Lifecycle
///
/// 1. Created with clocks already started
/// 2. Buffers rotate in the background for the session lifetime
/// 3. [`stop()`](Session::stop) halts the clocks, drains Pending-Treatment,
///    joins the worker, and surfaces any latched fault
/// 4. Dropping without `stop()` still shuts the pipeline down, but cannot
///    join the worker or report errors
///
/// [`AudioRelayBuilder::build()`]: crate::AudioRelayBuilder::build
/// [`start()`]: crate::AudioRelayBuilder::start
pub struct Session {
    ctx: Arc<PipelineContext>,
    // Keep the stream alive - dropping it releases the hardware
    stream: Box<dyn DuplexStream>,
    worker_handle: Option<JoinHandle<Result<(), AudioRelayError>>>,
}

impl Session {
    pub(crate) fn new(ctx: Arc<PipelineContext>, stream: Box<dyn DuplexStream>) -> Self {
        Self {
            ctx,
            stream,
            worker_handle: None,
        }
    }

    /// Registers the spawned worker task so [`stop()`](Session::stop) can
    /// join it.
    ///
    /// [`AudioRelayBuilder::start()`](crate::AudioRelayBuilder::start) does
    /// this automatically; call it yourself when spawning the
    /// [`TreatmentWorker`](crate::TreatmentWorker) through your own
    /// facility.
    pub fn attach_worker(&mut self, handle: JoinHandle<Result<(), AudioRelayError>>) {
        self.worker_handle = Some(handle);
    }

    /// Returns `true` once a fatal fault has been latched.
    pub fn is_faulted(&self) -> bool {
        self.ctx.is_faulted()
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> RelayStats {
        let stats = &self.ctx.stats;
        RelayStats {
            captures: stats.captures.load(Ordering::SeqCst),
            treatments: stats.treatments.load(Ordering::SeqCst),
            transport_sends: stats.transport_sends.load(Ordering::SeqCst),
            transport_failures: stats.transport_failures.load(Ordering::SeqCst),
            playback_underruns: stats.playback_underruns.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of the three queue populations.
    ///
    /// The totals always sum to the configured pool size.
    pub fn census(&self) -> PoolCensus {
        self.ctx.census()
    }

    /// Gracefully stops the relay.
    ///
    /// In order: halts the hardware clocks, marks the pipeline shutting
    /// down, lets the worker drain Pending-Treatment and joins it, then
    /// surfaces any latched fault.
    ///
    /// # Errors
    ///
    /// Returns the latched fault if one occurred, otherwise the worker's
    /// fatal error if it halted, otherwise any clock-stop failure.
    pub async fn stop(mut self) -> Result<(), AudioRelayError> {
        let clocks = self.stream.stop_clocks();
        self.ctx.begin_shutdown();

        let worker = match self.worker_handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(AudioRelayError::WorkerLost {
                    reason: e.to_string(),
                }),
            },
            None => Ok(()),
        };

        if let Some(fault) = self.ctx.take_fault() {
            return Err(fault);
        }
        worker?;
        clocks
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.ctx.is_shutdown() {
            // Dropped without explicit stop() - wake the worker so it can
            // drain and exit on its own
            let _ = self.stream.stop_clocks();
            self.ctx.begin_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::PcmPassthrough;
    use crate::stream::MockDuplex;
    use crate::{AudioRelay, RelayConfig};

    fn start_mock() -> (Session, crate::TreatmentWorker, MockDuplex) {
        let config = RelayConfig {
            pool_size: 8,
            ..RelayConfig::default()
        };
        let mut handle = None;
        let (session, worker) = AudioRelay::builder()
            .config(config.clone())
            .encoder(PcmPassthrough)
            .build(|port| {
                let mock = MockDuplex::connect(port, &config);
                handle = Some(mock.clone());
                Ok(mock)
            })
            .unwrap();
        (session, worker, handle.unwrap())
    }

    #[tokio::test]
    async fn test_stats_track_captures() {
        let (mut session, worker, mock) = start_mock();
        session.attach_worker(tokio::spawn(worker.run()));

        mock.complete_capture(&[1u8; 128]).unwrap();
        mock.complete_capture(&[2u8; 128]).unwrap();
        assert_eq!(session.stats().captures, 2);

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_drains_pending() {
        let (mut session, worker, mock) = start_mock();
        session.attach_worker(tokio::spawn(worker.run()));

        mock.complete_capture(&[3u8; 128]).unwrap();
        mock.complete_capture(&[4u8; 128]).unwrap();

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_surfaces_fault() {
        let (mut session, worker, mock) = start_mock();
        session.attach_worker(tokio::spawn(worker.run()));

        mock.inject_error("simulated fault");
        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, AudioRelayError::StreamFault { .. }));
    }

    #[tokio::test]
    async fn test_census_conserves_pool() {
        let (mut session, worker, mock) = start_mock();
        session.attach_worker(tokio::spawn(worker.run()));

        for k in 0..4u8 {
            mock.complete_capture(&[k; 128]).unwrap();
            assert_eq!(session.census().total(), 8);
        }
        session.stop().await.unwrap();
    }
}
