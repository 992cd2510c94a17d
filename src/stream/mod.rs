//! Hardware capture/playback capability boundary and its backends.
//!
//! The pipeline treats the hardware layer as an opaque capability: it is
//! opened with the pipeline's [`StreamPort`](crate::StreamPort) (the three
//! completion callbacks) and controlled only through clock start/stop.
//! Two backends are provided: [`DeviceDuplex`] drives real devices through
//! cpal, [`MockDuplex`] is a manually-stepped stand-in for tests and CI.

mod device;
mod mock;

pub use device::DeviceDuplex;
pub use mock::MockDuplex;

use crate::AudioRelayError;

/// A duplex capture/playback capability.
///
/// Implementations invoke the port's completion handlers from their own
/// notification context: `capture_complete` once per filled block,
/// `playback_complete` once per block to output, `stream_error` on a
/// hardware fault. Blocks are exactly the configured buffer size.
///
/// Dropping an implementation must release the hardware; `stop_clocks`
/// halts I/O without releasing it.
pub trait DuplexStream {
    /// Starts capture and playback clocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware refuses to start.
    fn start_clocks(&mut self) -> Result<(), AudioRelayError>;

    /// Halts capture and playback clocking.
    ///
    /// Called first during clean shutdown, before the worker is drained
    /// and joined.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware refuses to stop.
    fn stop_clocks(&mut self) -> Result<(), AudioRelayError>;
}
