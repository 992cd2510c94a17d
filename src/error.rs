//! Error types for audio-relay.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`AudioRelayError`]): stop the pipeline, either before
//!   steady state begins (setup) or by halting the stream/worker.
//! - **Recoverable errors** ([`TransportError`]): transport send failures
//!   surfaced via [`RelayEvent`](crate::RelayEvent); the pipeline continues.

/// Fatal pipeline errors.
///
/// Setup variants are returned from [`AudioRelayBuilder::build()`] before
/// steady state begins. Stream and protocol variants are latched by the
/// completion handlers or returned from the worker task and surface through
/// [`Session::stop()`].
///
/// [`AudioRelayBuilder::build()`]: crate::AudioRelayBuilder::build
/// [`Session::stop()`]: crate::Session::stop
#[derive(Debug, thiserror::Error)]
pub enum AudioRelayError {
    /// The pipeline configuration is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// No encoder was configured before building the pipeline.
    #[error("no encoder configured - the treatment worker needs one")]
    EncoderMissing,

    /// The hardware capture/playback capability could not be opened.
    #[error("stream open failed: {reason}")]
    StreamOpenFailed {
        /// Why the stream could not be opened.
        reason: String,
    },

    /// The transport sink could not be initialized.
    #[error("transport init failed: {reason}")]
    TransportInitFailed {
        /// Why the transport could not be initialized.
        reason: String,
    },

    /// The hardware signalled a stream error.
    ///
    /// Unrecoverable without a full reinitialization of the pipeline.
    #[error("stream fault: {reason}")]
    StreamFault {
        /// Reason reported by the hardware layer.
        reason: String,
    },

    /// A capture completion found no Capture-Ready transaction.
    ///
    /// The worker fell behind until the pool starved; the pool never grows,
    /// so this is fatal.
    #[error("capture-ready queue exhausted: treatment is not keeping pace")]
    CaptureExhausted,

    /// The hardware layer handed over a block whose size does not match the
    /// configured transaction buffer size. Never silently truncated.
    #[error("block size mismatch: expected {expected} bytes, got {got}")]
    BlockSizeMismatch {
        /// Configured transaction buffer size.
        expected: usize,
        /// Size the hardware layer delivered or requested.
        got: usize,
    },

    /// The encoder returned a length outside `[1, max_packet]`.
    ///
    /// An out-of-range length means the encode state can no longer be
    /// trusted; the worker halts without dispatching the output.
    #[error("encoder contract violated: returned {bytes} bytes (valid range 1..={max})")]
    EncoderContract {
        /// Length the encoder claimed to have written.
        bytes: usize,
        /// Declared maximum packet size.
        max: usize,
    },

    /// The encoder reported an error code.
    #[error("encoder failed: {reason}")]
    EncoderFailed {
        /// Description of the encoder failure.
        reason: String,
    },

    /// The worker task terminated abnormally (panicked or was cancelled).
    #[error("treatment worker lost: {reason}")]
    WorkerLost {
        /// Join error description.
        reason: String,
    },
}

impl AudioRelayError {
    /// Creates an invalid-configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a stream-open error with the given reason.
    pub fn stream_open(reason: impl Into<String>) -> Self {
        Self::StreamOpenFailed {
            reason: reason.into(),
        }
    }
}

/// Recoverable errors from a [`TransportSink`](crate::TransportSink).
///
/// Transport errors never stop the pipeline: the worker reports them via
/// [`RelayEvent::TransportFailed`](crate::RelayEvent::TransportFailed) and
/// recycles the transaction to Capture-Ready regardless.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A send operation failed.
    #[error("send failed: {reason}")]
    SendFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The sink has no usable peer or connection.
    #[error("transport not connected")]
    NotConnected,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl TransportError {
    /// Creates a send-failed error with the given reason.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed {
            reason: reason.into(),
        }
    }

    /// Creates a custom transport error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_display() {
        let err = AudioRelayError::EncoderContract {
            bytes: 2000,
            max: 1276,
        };
        assert_eq!(
            err.to_string(),
            "encoder contract violated: returned 2000 bytes (valid range 1..=1276)"
        );
    }

    #[test]
    fn test_exhausted_display() {
        let err = AudioRelayError::CaptureExhausted;
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn test_transport_error_send_failed() {
        let err = TransportError::send_failed("peer unreachable");
        assert_eq!(err.to_string(), "send failed: peer unreachable");
    }

    #[test]
    fn test_transport_error_custom() {
        let err = TransportError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
