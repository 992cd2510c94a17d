//! Builder - the initialization entry point.

use std::sync::Arc;

use crate::encode::Encoder;
use crate::event::{EventCallback, RelayEvent};
use crate::pipeline::{PipelineContext, StreamPort, TreatmentWorker};
use crate::session::Session;
use crate::stream::DuplexStream;
use crate::transport::TransportSink;
use crate::{AudioRelayError, ModeFlag, RelayConfig};

/// Entry point for constructing a relay pipeline.
///
/// # Example
///
/// ```ignore
/// use audio_relay::{AudioRelay, DeviceDuplex, ModeFlag, PcmPassthrough, RelayConfig};
///
/// let config = RelayConfig::default();
/// let session = AudioRelay::builder()
///     .config(config.clone())
///     .mode(ModeFlag::loopback())
///     .encoder(PcmPassthrough)
///     .start(|port| DeviceDuplex::open(&config, port))
///     .await?;
/// ```
pub struct AudioRelay;

impl AudioRelay {
    /// Creates a builder with default configuration (16 kHz voice,
    /// loopback mode).
    #[must_use]
    pub fn builder() -> AudioRelayBuilder {
        AudioRelayBuilder {
            config: RelayConfig::default(),
            mode: ModeFlag::loopback(),
            encoder: None,
            transport: None,
            event_callback: None,
        }
    }
}

/// Builder for a relay pipeline.
///
/// `build()` is the initialization entry point from the outside world's
/// perspective: it allocates the pool, populates the two ready queues,
/// registers the completion callbacks with the hardware capability, and
/// starts the clocks. The returned [`TreatmentWorker`] is the worker-task
/// entry point - hand it to [`tokio::spawn`] or any other task facility
/// (priority and stack sizing are yours to configure there), or use
/// `start()` to have it spawned for you.
pub struct AudioRelayBuilder {
    config: RelayConfig,
    mode: ModeFlag,
    encoder: Option<Box<dyn Encoder>>,
    transport: Option<Arc<dyn TransportSink>>,
    event_callback: Option<EventCallback>,
}

impl AudioRelayBuilder {
    /// Sets the pipeline configuration.
    #[must_use]
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the mode flag. Keep a clone to flip loopback/forwarding at
    /// runtime; the core only reads it.
    #[must_use]
    pub fn mode(mut self, mode: ModeFlag) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the encode capability. Required.
    #[must_use]
    pub fn encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    /// Sets the transport sink used in forwarding mode.
    ///
    /// Without one, forwarded packets are dropped (reported as transport
    /// failures) while the buffers still recycle.
    #[must_use]
    pub fn transport(mut self, transport: impl TransportSink + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Registers a callback for runtime events.
    #[must_use]
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(RelayEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Arc::new(f));
        self
    }

    /// Initializes the pipeline and returns the session handle plus the
    /// worker-task entry point.
    ///
    /// `open` receives the [`StreamPort`] (the three completion callbacks)
    /// and must return the opened hardware capability; its clocks are
    /// started before this returns. Spawn the worker yourself and register
    /// the handle with [`Session::attach_worker`].
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a missing encoder, or a hardware
    /// open/start failure.
    pub fn build<S, F>(self, open: F) -> Result<(Session, TreatmentWorker), AudioRelayError>
    where
        S: DuplexStream + 'static,
        F: FnOnce(StreamPort) -> Result<S, AudioRelayError>,
    {
        self.config.validate()?;
        let encoder = self.encoder.ok_or(AudioRelayError::EncoderMissing)?;

        let ctx = PipelineContext::new(&self.config, self.mode, self.event_callback);
        tracing::info!(
            pool = self.config.pool_size,
            buffer_bytes = self.config.buffer_bytes,
            rate = self.config.sample_rate,
            channels = self.config.channels,
            "audio relay initializing"
        );

        let mut stream = open(StreamPort::new(ctx.clone()))?;
        let worker = TreatmentWorker::new(ctx.clone(), encoder, self.transport, &self.config);
        stream.start_clocks()?;

        Ok((Session::new(ctx, Box::new(stream)), worker))
    }

    /// Like [`build()`](AudioRelayBuilder::build), but spawns the worker on
    /// the current tokio runtime and returns just the session.
    ///
    /// # Errors
    ///
    /// Same failure modes as `build()`.
    pub async fn start<S, F>(self, open: F) -> Result<Session, AudioRelayError>
    where
        S: DuplexStream + 'static,
        F: FnOnce(StreamPort) -> Result<S, AudioRelayError>,
    {
        let (mut session, worker) = self.build(open)?;
        session.attach_worker(tokio::spawn(worker.run()));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::PcmPassthrough;
    use crate::stream::MockDuplex;

    #[test]
    fn test_build_requires_encoder() {
        let config = RelayConfig::default();
        let result = AudioRelay::builder()
            .config(config.clone())
            .build(|port| Ok(MockDuplex::connect(port, &config)));

        assert!(matches!(result, Err(AudioRelayError::EncoderMissing)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = RelayConfig {
            pool_size: 0,
            ..RelayConfig::default()
        };
        let result = AudioRelay::builder()
            .config(config.clone())
            .encoder(PcmPassthrough)
            .build(|port| Ok(MockDuplex::connect(port, &config)));

        assert!(matches!(result, Err(AudioRelayError::InvalidConfig { .. })));
    }

    #[test]
    fn test_build_starts_clocks() {
        let config = RelayConfig::default();
        let mut handle = None;
        let (session, _worker) = AudioRelay::builder()
            .config(config.clone())
            .encoder(PcmPassthrough)
            .build(|port| {
                let mock = MockDuplex::connect(port, &config);
                handle = Some(mock.clone());
                Ok(mock)
            })
            .unwrap();

        assert!(handle.unwrap().is_running());
        assert_eq!(session.census().total(), 32);
    }

    #[tokio::test]
    async fn test_start_spawns_worker() {
        let config = RelayConfig::default();
        let session = AudioRelay::builder()
            .config(config.clone())
            .encoder(PcmPassthrough)
            .start(|port| Ok(MockDuplex::connect(port, &config)))
            .await
            .unwrap();

        session.stop().await.unwrap();
    }

    #[test]
    fn test_open_failure_propagates() {
        let result = AudioRelay::builder().encoder(PcmPassthrough).build(
            |_port| -> Result<MockDuplex, AudioRelayError> {
                Err(AudioRelayError::stream_open("no such device"))
            },
        );

        assert!(matches!(
            result,
            Err(AudioRelayError::StreamOpenFailed { .. })
        ));
    }
}
