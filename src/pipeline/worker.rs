//! Treatment worker - the schedulable half of the pipeline.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::encode::Encoder;
use crate::event::RelayEvent;
use crate::pipeline::PipelineContext;
use crate::pool::SlotId;
use crate::transport::TransportSink;
use crate::{AudioRelayError, Mode, RelayConfig};

/// A transaction claimed for treatment.
///
/// The transaction stays at the head of Pending-Treatment while its buffer
/// is out being encoded; it is removed and relinked only at dispatch, so
/// the queue census holds during treatment and an encode fault leaves the
/// transaction where it was.
struct TreatmentJob {
    id: SlotId,
    buf: Box<[u8]>,
    len: usize,
    seq: u64,
}

/// The worker-task entry point.
///
/// Built by [`AudioRelayBuilder::build()`] and either handed to
/// [`tokio::spawn`] (what [`AudioRelayBuilder::start()`] does) or to any
/// other task-creation facility the caller prefers - priority and stack
/// sizing are the caller's business, not the pipeline's.
///
/// The loop body: wait for the synchronization counter, take the oldest
/// pending transaction, encode into the scratch packet area, validate the
/// encoder's contract, dispatch by mode, repeat. Encoding and transport
/// I/O happen outside the pool lock.
///
/// [`AudioRelayBuilder::build()`]: crate::AudioRelayBuilder::build
/// [`AudioRelayBuilder::start()`]: crate::AudioRelayBuilder::start
pub struct TreatmentWorker {
    ctx: Arc<PipelineContext>,
    encoder: Box<dyn Encoder>,
    transport: Option<Arc<dyn TransportSink>>,
    /// Scratch output area, allocated once at `max_packet_bytes`.
    packet: Box<[u8]>,
    retry_attempts: u32,
    retry_delay: Duration,
    last_seq: Option<u64>,
}

impl TreatmentWorker {
    pub(crate) fn new(
        ctx: Arc<PipelineContext>,
        encoder: Box<dyn Encoder>,
        transport: Option<Arc<dyn TransportSink>>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            ctx,
            encoder,
            transport,
            packet: vec![0u8; config.max_packet_bytes].into_boxed_slice(),
            retry_attempts: config.transport_retry_attempts,
            retry_delay: config.transport_retry_delay,
            last_seq: None,
        }
    }

    /// Runs the treatment loop until shutdown, a latched fault, or a fatal
    /// worker error.
    ///
    /// On shutdown the remaining Pending-Treatment transactions are drained
    /// before returning, so none stays stuck.
    ///
    /// # Errors
    ///
    /// Returns the fatal worker error (encoder contract violation or
    /// encoder failure) that halted the loop. Faults latched by the
    /// completion handlers are *not* returned here - they surface through
    /// [`Session::stop()`](crate::Session::stop).
    pub async fn run(mut self) -> Result<(), AudioRelayError> {
        loop {
            // The only blocking point in the worker.
            match self.ctx.work_ready.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => break,
            }

            if self.ctx.is_faulted() {
                break;
            }
            if self.ctx.is_shutdown() {
                // Clocks are already stopped; drain what's left.
                while let Some(job) = self.claim() {
                    self.treat(job).await?;
                }
                break;
            }

            if let Some(job) = self.claim() {
                self.treat(job).await?;
            }
        }
        Ok(())
    }

    /// Takes the buffer of the oldest pending transaction.
    fn claim(&self) -> Option<TreatmentJob> {
        let mut pool = self.ctx.pool.lock();
        let id = pool.pending_head()?;
        let slot = pool.slot_mut(id);
        let buf = std::mem::take(&mut slot.buf);
        Some(TreatmentJob {
            id,
            buf,
            len: slot.len,
            seq: slot.seq,
        })
    }

    async fn treat(&mut self, job: TreatmentJob) -> Result<(), AudioRelayError> {
        if let Some(last) = self.last_seq {
            debug_assert!(job.seq >= last, "pending dequeue out of order");
        }
        self.last_seq = Some(job.seq);

        let frames = job.len / self.ctx.frame_bytes;
        let max = self.ctx.max_packet_bytes;
        let bytes = match self.encoder.encode(&job.buf[..job.len], frames, &mut self.packet) {
            Ok(n) if (1..=max).contains(&n) => n,
            Ok(n) => {
                self.abort(job);
                return Err(self.halt(AudioRelayError::EncoderContract { bytes: n, max }));
            }
            Err(e) => {
                self.abort(job);
                return Err(self.halt(AudioRelayError::EncoderFailed {
                    reason: e.to_string(),
                }));
            }
        };

        match self.ctx.mode.current() {
            Mode::Loopback => {
                let mut pool = self.ctx.pool.lock();
                pool.slot_mut(job.id).buf = job.buf;
                pool.pop_pending(job.id);
                pool.push_playback_ready(job.id);
            }
            Mode::Forwarding => {
                // Best-effort send, then recycle regardless of outcome. A
                // slow sink throttles capture by design: the buffer only
                // returns once the send resolves.
                self.send_packet(bytes).await;
                let mut pool = self.ctx.pool.lock();
                pool.slot_mut(job.id).buf = job.buf;
                pool.pop_pending(job.id);
                pool.push_capture_ready(job.id);
            }
        }

        let treated = self.ctx.stats.treatments.fetch_add(1, Ordering::SeqCst) + 1;
        if treated % 256 == 0 {
            tracing::debug!(treated, seq = job.seq, "treatment progress");
        }
        Ok(())
    }

    /// Puts an untreated job back: buffer restored, transaction left at the
    /// head of Pending-Treatment, counter re-raised to match the queue.
    fn abort(&self, job: TreatmentJob) {
        let mut pool = self.ctx.pool.lock();
        pool.slot_mut(job.id).buf = job.buf;
        drop(pool);
        self.ctx.work_ready.add_permits(1);
    }

    fn halt(&self, err: AudioRelayError) -> AudioRelayError {
        tracing::error!(error = %err, "treatment worker halting");
        self.ctx.emit(RelayEvent::WorkerHalted {
            reason: err.to_string(),
        });
        err
    }

    async fn send_packet(&self, bytes: usize) {
        let payload = &self.packet[..bytes];
        let Some(ref transport) = self.transport else {
            self.ctx.stats.transport_failures.fetch_add(1, Ordering::SeqCst);
            self.ctx.emit(RelayEvent::TransportFailed {
                attempts: 0,
                error: "no transport configured".to_string(),
            });
            return;
        };

        let mut delay = self.retry_delay;
        for attempt in 1..=self.retry_attempts {
            match transport.send(payload).await {
                Ok(()) => {
                    self.ctx.stats.transport_sends.fetch_add(1, Ordering::SeqCst);
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        sink = transport.name(),
                        attempt,
                        error = %e,
                        "transport send failed"
                    );
                    if attempt == self.retry_attempts {
                        self.ctx.stats.transport_failures.fetch_add(1, Ordering::SeqCst);
                        self.ctx.emit(RelayEvent::TransportFailed {
                            attempts: attempt,
                            error: e.to_string(),
                        });
                    } else {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{EncodeError, PcmPassthrough};
    use crate::pipeline::StreamPort;
    use crate::{ModeFlag, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    /// Transport stub that records payloads and can fail on demand.
    struct RecordingTransport {
        payloads: StdMutex<Vec<Vec<u8>>>,
        fail_times: AtomicUsize,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                payloads: StdMutex::new(Vec::new()),
                fail_times: AtomicUsize::new(0),
            })
        }

        fn failing(times: usize) -> Arc<Self> {
            let t = Self::new();
            t.fail_times.store(times, Ordering::SeqCst);
            t
        }

        fn payloads(&self) -> Vec<Vec<u8>> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransportSink for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::send_failed("intentional failure"));
            }
            self.payloads.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    /// Encoder stub returning a fixed length, valid or not.
    struct FixedLenEncoder {
        len: usize,
    }

    impl Encoder for FixedLenEncoder {
        fn encode(
            &mut self,
            _samples: &[u8],
            _frames: usize,
            _out: &mut [u8],
        ) -> Result<usize, EncodeError> {
            Ok(self.len)
        }
    }

    fn setup(
        pool_size: usize,
        mode: ModeFlag,
        encoder: Box<dyn Encoder>,
        transport: Option<Arc<dyn TransportSink>>,
    ) -> (StreamPort, TreatmentWorker) {
        let config = RelayConfig {
            pool_size,
            transport_retry_delay: Duration::from_millis(1),
            ..RelayConfig::default()
        };
        let ctx = PipelineContext::new(&config, mode, None);
        let worker = TreatmentWorker::new(ctx.clone(), encoder, transport, &config);
        (StreamPort::new(ctx), worker)
    }

    fn drain(port: &StreamPort) {
        port.ctx.begin_shutdown();
    }

    #[tokio::test]
    async fn test_loopback_dispatch() {
        let (port, worker) = setup(8, ModeFlag::loopback(), Box::new(PcmPassthrough), None);

        port.capture_complete(&[7u8; 128]).unwrap();
        port.capture_complete(&[8u8; 128]).unwrap();
        drain(&port);
        worker.run().await.unwrap();

        let census = port.ctx.census();
        assert_eq!(census.pending, 0);
        assert_eq!(census.playback_ready, 6);
        assert_eq!(census.capture_ready, 2);
    }

    #[tokio::test]
    async fn test_forwarding_sends_and_recycles() {
        let transport = RecordingTransport::new();
        let (port, worker) = setup(
            8,
            ModeFlag::forwarding(),
            Box::new(PcmPassthrough),
            Some(transport.clone() as Arc<dyn TransportSink>),
        );

        port.capture_complete(&[1u8; 128]).unwrap();
        port.capture_complete(&[2u8; 128]).unwrap();
        drain(&port);
        worker.run().await.unwrap();

        let census = port.ctx.census();
        assert_eq!(census.pending, 0);
        assert_eq!(census.capture_ready, 4);

        // Encoded payloads arrive in capture order
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], vec![1u8; 128]);
        assert_eq!(payloads[1], vec![2u8; 128]);
    }

    #[tokio::test]
    async fn test_send_failure_still_recycles() {
        let transport = RecordingTransport::failing(100);
        let (port, worker) = setup(
            8,
            ModeFlag::forwarding(),
            Box::new(PcmPassthrough),
            Some(transport as Arc<dyn TransportSink>),
        );

        port.capture_complete(&[3u8; 128]).unwrap();
        drain(&port);
        worker.run().await.unwrap();

        // Non-fatal: buffer came back to capture despite the failure
        let census = port.ctx.census();
        assert_eq!(census.capture_ready, 4);
        assert_eq!(
            port.ctx.stats.transport_failures.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let transport = RecordingTransport::failing(2);
        let config = RelayConfig {
            pool_size: 8,
            transport_retry_attempts: 3,
            transport_retry_delay: Duration::from_millis(1),
            ..RelayConfig::default()
        };
        let ctx = PipelineContext::new(&config, ModeFlag::forwarding(), None);
        let worker = TreatmentWorker::new(
            ctx.clone(),
            Box::new(PcmPassthrough),
            Some(transport.clone() as Arc<dyn TransportSink>),
            &config,
        );
        let port = StreamPort::new(ctx);

        port.capture_complete(&[4u8; 128]).unwrap();
        port.ctx.begin_shutdown();
        worker.run().await.unwrap();

        assert_eq!(transport.payloads().len(), 1);
        assert_eq!(port.ctx.stats.transport_sends.load(Ordering::SeqCst), 1);
        assert_eq!(port.ctx.stats.transport_failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_encode_is_fatal() {
        let transport = RecordingTransport::new();
        let (port, worker) = setup(
            8,
            ModeFlag::forwarding(),
            Box::new(FixedLenEncoder { len: 5000 }),
            Some(transport.clone() as Arc<dyn TransportSink>),
        );

        port.capture_complete(&[5u8; 128]).unwrap();
        drain(&port);
        let err = worker.run().await.unwrap_err();

        assert!(matches!(
            err,
            AudioRelayError::EncoderContract { bytes: 5000, .. }
        ));
        // No dispatch: nothing was sent, transaction still pending
        assert!(transport.payloads().is_empty());
        assert_eq!(port.ctx.census().pending, 1);
        assert_eq!(port.ctx.census().total(), 8);
    }

    #[tokio::test]
    async fn test_zero_length_encode_is_fatal() {
        let (port, worker) = setup(
            8,
            ModeFlag::loopback(),
            Box::new(FixedLenEncoder { len: 0 }),
            None,
        );

        port.capture_complete(&[6u8; 128]).unwrap();
        drain(&port);
        let err = worker.run().await.unwrap_err();
        assert!(matches!(err, AudioRelayError::EncoderContract { bytes: 0, .. }));
    }

    #[tokio::test]
    async fn test_worker_stops_on_latched_fault() {
        let (port, worker) = setup(8, ModeFlag::loopback(), Box::new(PcmPassthrough), None);

        port.stream_error("hardware gone");
        // The fault permit wakes the worker, which exits cleanly; the
        // fault itself surfaces through the session.
        worker.run().await.unwrap();
        assert!(port.ctx.is_faulted());
    }
}
