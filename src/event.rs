//! Runtime events for monitoring pipeline health.
//!
//! Events are notifications about pipeline behavior delivered outside the
//! error path. Non-fatal conditions (transport failures, playback
//! underruns) leave the pipeline running; fault events mirror an error that
//! is also latched for [`Session::stop()`](crate::Session::stop), so a
//! supervision layer can react without polling.

use std::sync::Arc;

/// Runtime events emitted during relay operation.
///
/// Register an [`EventCallback`] via
/// [`AudioRelayBuilder::on_event()`](crate::AudioRelayBuilder::on_event) to
/// log these or update metrics. Callbacks may be invoked from the worker
/// task or the completion-handler context and must not block.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A transport send gave up after exhausting its attempts.
    ///
    /// The transaction was still recycled to Capture-Ready; only the
    /// payload was lost.
    TransportFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last error.
        error: String,
    },

    /// A playback period found no Playback-Ready transaction and emitted
    /// silence instead.
    ///
    /// Expected while forwarding (nothing feeds the playback queue) and
    /// transiently at startup; sustained underruns in loopback mode mean
    /// treatment is not keeping pace.
    PlaybackUnderrun {
        /// Total underrun periods so far in this session.
        total: u64,
    },

    /// A fatal fault was latched by a completion handler.
    ///
    /// The pipeline is no longer healthy; the corresponding error is
    /// returned from [`Session::stop()`](crate::Session::stop).
    StreamFault {
        /// Description of the fault.
        reason: String,
    },

    /// The treatment worker halted on a fatal error.
    WorkerHalted {
        /// Description of why the worker stopped.
        reason: String,
    },
}

/// Callback type for receiving runtime events.
pub type EventCallback = Arc<dyn Fn(RelayEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// Convenience for building callbacks without wrapping in `Arc` manually.
///
/// # Example
///
/// ```
/// use audio_relay::{event_callback, RelayEvent};
///
/// let callback = event_callback(|event| {
///     if let RelayEvent::TransportFailed { error, .. } = event {
///         eprintln!("send failed: {error}");
///     }
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(RelayEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
