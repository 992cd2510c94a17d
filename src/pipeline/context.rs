//! Shared pipeline state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::event::{EventCallback, RelayEvent};
use crate::pool::{PoolCensus, TransactionPool};
use crate::{AudioRelayError, ModeFlag, RelayConfig};

/// Counters shared between the handlers, the worker, and the session.
#[derive(Default)]
pub(crate) struct PipelineStats {
    pub captures: AtomicU64,
    pub treatments: AtomicU64,
    pub transport_sends: AtomicU64,
    pub transport_failures: AtomicU64,
    pub playback_underruns: AtomicU64,
}

/// The one shared value behind the whole pipeline.
///
/// Constructed once at initialization and captured by the callback port and
/// the worker task. The pool mutex is held only for index relinks and
/// bounded fixed-size copies; the semaphore is the synchronization counter
/// (permit release is the non-blocking raise, acquire the worker's wait).
pub(crate) struct PipelineContext {
    pub pool: Mutex<TransactionPool>,
    pub work_ready: Semaphore,
    pub mode: ModeFlag,
    pub buffer_bytes: usize,
    pub frame_bytes: usize,
    pub max_packet_bytes: usize,
    pub stats: PipelineStats,
    fault: Mutex<Option<AudioRelayError>>,
    faulted: AtomicBool,
    shutdown: AtomicBool,
    event_callback: Option<EventCallback>,
}

impl PipelineContext {
    pub fn new(
        config: &RelayConfig,
        mode: ModeFlag,
        event_callback: Option<EventCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool: Mutex::new(TransactionPool::new(config.pool_size, config.buffer_bytes)),
            work_ready: Semaphore::new(0),
            mode,
            buffer_bytes: config.buffer_bytes,
            frame_bytes: config.frame_bytes(),
            max_packet_bytes: config.max_packet_bytes,
            stats: PipelineStats::default(),
            fault: Mutex::new(None),
            faulted: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            event_callback,
        })
    }

    pub fn emit(&self, event: RelayEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// Records a fatal fault from the completion-handler domain.
    ///
    /// First fault wins; later ones are dropped. The worker is woken so it
    /// can observe the fault instead of sleeping forever.
    pub fn latch_fault(&self, err: AudioRelayError) {
        let mut fault = self.fault.lock();
        if fault.is_some() {
            return;
        }
        tracing::error!(error = %err, "pipeline fault latched");
        self.emit(RelayEvent::StreamFault {
            reason: err.to_string(),
        });
        *fault = Some(err);
        self.faulted.store(true, Ordering::SeqCst);
        self.work_ready.add_permits(1);
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// Takes the latched fault, if any. Called once during teardown.
    pub fn take_fault(&self) -> Option<AudioRelayError> {
        self.fault.lock().take()
    }

    /// Marks the pipeline as shutting down and wakes the worker so it can
    /// drain Pending-Treatment and exit.
    pub fn begin_shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.work_ready.add_permits(1);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn census(&self) -> PoolCensus {
        self.pool.lock().census()
    }
}
