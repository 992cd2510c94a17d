//! Completion-handler entry points.
//!
//! A [`StreamPort`] is handed to the hardware capability at open time and
//! carries the three callbacks the capability invokes: capture completion,
//! playback completion, and stream error. All three run in the hardware
//! layer's notification context and do bounded work only - one fixed-size
//! buffer copy plus index relinks under a short lock, never an allocation,
//! an encode, or transport I/O.

use std::sync::Arc;

use crate::event::RelayEvent;
use crate::pipeline::PipelineContext;
use crate::{AudioRelayError, Mode};

/// Hardware-facing face of the pipeline.
///
/// Cloneable so a duplex backend can hand one copy to its input side and
/// one to its output side.
#[derive(Clone)]
pub struct StreamPort {
    pub(crate) ctx: Arc<PipelineContext>,
}

impl StreamPort {
    pub(crate) fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Capture-completion handler.
    ///
    /// The hardware layer finished filling one block; `block` is the
    /// completed data, exactly one transaction buffer in size. The head of
    /// Capture-Ready absorbs it, gets its sequence tag, moves to
    /// Pending-Treatment, and the synchronization counter is raised.
    ///
    /// # Errors
    ///
    /// [`AudioRelayError::CaptureExhausted`] if no Capture-Ready
    /// transaction exists (treatment fell behind until the pool starved)
    /// and [`AudioRelayError::BlockSizeMismatch`] if `block` is not exactly
    /// the configured buffer size. Both are fatal and latched; the backend
    /// should stop invoking the port.
    pub fn capture_complete(&self, block: &[u8]) -> Result<(), AudioRelayError> {
        if self.ctx.is_shutdown() || self.ctx.is_faulted() {
            return Ok(());
        }
        if block.len() != self.ctx.buffer_bytes {
            self.ctx.latch_fault(AudioRelayError::BlockSizeMismatch {
                expected: self.ctx.buffer_bytes,
                got: block.len(),
            });
            return Err(AudioRelayError::BlockSizeMismatch {
                expected: self.ctx.buffer_bytes,
                got: block.len(),
            });
        }

        {
            let mut pool = self.ctx.pool.lock();
            let Some(id) = pool.pop_capture_ready() else {
                drop(pool);
                self.ctx.latch_fault(AudioRelayError::CaptureExhausted);
                return Err(AudioRelayError::CaptureExhausted);
            };
            let slot = pool.slot_mut(id);
            slot.buf.copy_from_slice(block);
            slot.len = block.len();
            pool.push_pending(id);
        }

        self.ctx.work_ready.add_permits(1);
        self.ctx
            .stats
            .captures
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    /// Playback-completion handler.
    ///
    /// The hardware layer finished playing one block and needs the next.
    /// The transaction that just finished is routed by mode - loopback
    /// recycles it to Capture-Ready, forwarding re-enters it into
    /// Pending-Treatment (raising the counter like a capture completion
    /// does). The new head of Playback-Ready is copied into `out`; if the
    /// queue is empty, `out` is silence and an underrun is reported
    /// (non-fatal). The first invocation after start has no finished
    /// transaction and performs no move.
    ///
    /// # Errors
    ///
    /// [`AudioRelayError::BlockSizeMismatch`] if `out` is not exactly the
    /// configured buffer size (fatal, latched).
    pub fn playback_complete(&self, out: &mut [u8]) -> Result<(), AudioRelayError> {
        if out.len() != self.ctx.buffer_bytes {
            self.ctx.latch_fault(AudioRelayError::BlockSizeMismatch {
                expected: self.ctx.buffer_bytes,
                got: out.len(),
            });
            return Err(AudioRelayError::BlockSizeMismatch {
                expected: self.ctx.buffer_bytes,
                got: out.len(),
            });
        }
        if self.ctx.is_shutdown() || self.ctx.is_faulted() {
            out.fill(0);
            return Ok(());
        }

        let mut raise = false;
        let mut underrun = false;
        {
            let mut pool = self.ctx.pool.lock();

            if let Some(done) = pool.playing.take() {
                pool.pop_playback_ready(done);
                match self.ctx.mode.current() {
                    Mode::Loopback => pool.push_capture_ready(done),
                    Mode::Forwarding => {
                        // Re-entry for treatment; the worker is the sole
                        // consumer, so the counter must rise with the queue.
                        pool.push_pending(done);
                        raise = true;
                    }
                }
            }

            match pool.playback_head() {
                Some(next) => {
                    let len = pool.slot(next).len;
                    out[..len].copy_from_slice(&pool.slot(next).buf[..len]);
                    out[len..].fill(0);
                    pool.playing = Some(next);
                }
                None => {
                    out.fill(0);
                    underrun = true;
                }
            }
        }

        if raise {
            self.ctx.work_ready.add_permits(1);
        }
        if underrun {
            let total = self
                .ctx
                .stats
                .playback_underruns
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            self.ctx.emit(RelayEvent::PlaybackUnderrun { total });
        }
        Ok(())
    }

    /// Snapshot of the three queue populations.
    ///
    /// Diagnostic view for backends and tests; the totals always sum to
    /// the pool size.
    pub fn census(&self) -> crate::PoolCensus {
        self.ctx.census()
    }

    /// Error handler: the hardware signalled a stream fault.
    ///
    /// Latches the fault for the supervision layer, which tears the stream
    /// down; the handler itself never blocks or retries.
    pub fn stream_error(&self, reason: &str) {
        self.ctx.latch_fault(AudioRelayError::StreamFault {
            reason: reason.to_string(),
        });
    }
}
