//! Encode capability boundary.
//!
//! The codec itself is opaque to the pipeline: the worker hands it raw
//! samples and a scratch output area, and validates the returned length
//! against `1..=max_packet_bytes`. Wrap an Opus/codec binding in this trait
//! to plug it in; [`PcmPassthrough`] is the no-codec stand-in used by demos
//! and tests.

/// Error reported by an encode capability.
///
/// Any encoder error is treated as fatal by the treatment worker: a failed
/// encode means the codec state can no longer be trusted.
#[derive(Debug, thiserror::Error)]
#[error("encode failed with code {code}")]
pub struct EncodeError {
    /// Implementation-defined error code.
    pub code: i32,
}

/// An audio encoder the treatment worker drives.
///
/// # Contract
///
/// `encode` consumes `frames` interleaved frames from `samples` and writes
/// the encoded packet into `out`, returning the number of bytes written.
/// The worker validates the return value against `1..=max_packet_bytes`
/// and halts the pipeline on any value outside that range - encoders must
/// report oversized output as an error, never truncate.
pub trait Encoder: Send + Sync {
    /// Encodes one buffer of raw samples into `out`.
    fn encode(
        &mut self,
        samples: &[u8],
        frames: usize,
        out: &mut [u8],
    ) -> Result<usize, EncodeError>;
}

/// Passthrough "encoder" that copies raw PCM unchanged.
///
/// Useful for loopback demos and for exercising the pipeline without a
/// codec; the payload on the wire is the raw interleaved PCM block.
#[derive(Debug, Default)]
pub struct PcmPassthrough;

impl PcmPassthrough {
    /// Creates a passthrough encoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for PcmPassthrough {
    fn encode(
        &mut self,
        samples: &[u8],
        _frames: usize,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        if samples.len() > out.len() {
            return Err(EncodeError { code: -1 });
        }
        out[..samples.len()].copy_from_slice(samples);
        Ok(samples.len())
    }
}
