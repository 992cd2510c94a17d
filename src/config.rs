//! Configuration types for the relay pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::AudioRelayError;

/// Who drives the audio bus clocks.
///
/// Backends that cannot act as clock consumer (the cpal device backend,
/// for one) reject [`ClockRole::Peripheral`] at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockRole {
    /// This side generates the bus clocks.
    #[default]
    Controller,
    /// The far side generates the bus clocks.
    Peripheral,
}

/// Dispatch mode for treated transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Treated audio is queued for local playback.
    #[default]
    Loopback,
    /// Treated audio is sent to the transport sink and the buffer is
    /// recycled for capture.
    Forwarding,
}

/// Externally-owned mode selector, read (never written) by the core.
///
/// The flag is a cheap cloneable handle; the owner may flip it at any time
/// and the playback handler and worker observe the change on their next
/// cycle.
///
/// # Example
///
/// ```
/// use audio_relay::{Mode, ModeFlag};
///
/// let mode = ModeFlag::loopback();
/// assert_eq!(mode.current(), Mode::Loopback);
///
/// mode.set(Mode::Forwarding);
/// assert_eq!(mode.current(), Mode::Forwarding);
/// ```
#[derive(Debug, Clone)]
pub struct ModeFlag(Arc<AtomicBool>);

impl ModeFlag {
    /// Creates a flag starting in loopback mode.
    #[must_use]
    pub fn loopback() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Creates a flag starting in forwarding mode.
    #[must_use]
    pub fn forwarding() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Sets the mode. Owner-side API; the core never calls this.
    pub fn set(&self, mode: Mode) {
        self.0.store(mode == Mode::Loopback, Ordering::SeqCst);
    }

    /// Returns the current mode.
    pub fn current(&self) -> Mode {
        if self.0.load(Ordering::SeqCst) {
            Mode::Loopback
        } else {
            Mode::Forwarding
        }
    }
}

impl Default for ModeFlag {
    fn default() -> Self {
        Self::loopback()
    }
}

/// Configuration for the relay pipeline.
///
/// Use [`RelayConfig::default()`] (16 kHz voice) or a preset, then adjust
/// fields as needed. All sizing is fixed at initialization; nothing grows
/// in steady state.
///
/// # Example
///
/// ```
/// use audio_relay::RelayConfig;
///
/// let config = RelayConfig {
///     pool_size: 8,
///     ..RelayConfig::default()
/// };
/// assert_eq!(config.frames_per_buffer(), 32);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Number of transactions in the pool. Fixed for the process lifetime.
    ///
    /// More buffers add latency headroom for the treatment worker at the
    /// cost of end-to-end delay. Default: 32
    pub pool_size: usize,

    /// Size of each transaction buffer in bytes. Default: 128
    pub buffer_bytes: usize,

    /// Sample rate in Hz. Default: 16000
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo). Default: 2
    pub channels: u16,

    /// Bits per sample. Default: 16
    pub bits_per_sample: u16,

    /// Who drives the bus clocks. Default: [`ClockRole::Controller`]
    pub clock_role: ClockRole,

    /// Maximum encoded packet size in bytes; the worker's scratch output
    /// area is allocated once at this capacity. Default: 1276
    pub max_packet_bytes: usize,

    /// Number of attempts for a transport send before giving up on that
    /// packet. Default: 1 (no retry)
    pub transport_retry_attempts: u32,

    /// Delay between transport retry attempts. Default: 100ms
    pub transport_retry_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::voice_16k()
    }
}

impl RelayConfig {
    /// 16 kHz stereo, 128-byte buffers. Two stereo frames per millisecond.
    #[must_use]
    pub fn voice_16k() -> Self {
        Self {
            pool_size: 32,
            buffer_bytes: 128,
            sample_rate: 16000,
            channels: 2,
            bits_per_sample: 16,
            clock_role: ClockRole::Controller,
            max_packet_bytes: 1276,
            transport_retry_attempts: 1,
            transport_retry_delay: Duration::from_millis(100),
        }
    }

    /// 48 kHz stereo, 384-byte buffers (same per-buffer duration as the
    /// 16 kHz preset).
    #[must_use]
    pub fn wideband_48k() -> Self {
        Self {
            buffer_bytes: 384,
            sample_rate: 48000,
            ..Self::voice_16k()
        }
    }

    /// Bytes per interleaved frame (one sample per channel).
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Number of frames held by one transaction buffer.
    #[must_use]
    pub fn frames_per_buffer(&self) -> usize {
        self.buffer_bytes / self.frame_bytes()
    }

    pub(crate) fn validate(&self) -> Result<(), AudioRelayError> {
        if self.pool_size < 2 {
            return Err(AudioRelayError::invalid_config(
                "pool_size must be at least 2 (one per hardware direction)",
            ));
        }
        if self.buffer_bytes == 0 {
            return Err(AudioRelayError::invalid_config("buffer_bytes must be nonzero"));
        }
        if self.channels == 0 {
            return Err(AudioRelayError::invalid_config("channels must be nonzero"));
        }
        if self.bits_per_sample % 8 != 0 || self.bits_per_sample == 0 {
            return Err(AudioRelayError::invalid_config(
                "bits_per_sample must be a nonzero multiple of 8",
            ));
        }
        if self.buffer_bytes % self.frame_bytes() != 0 {
            return Err(AudioRelayError::invalid_config(format!(
                "buffer_bytes ({}) must be a multiple of the frame size ({})",
                self.buffer_bytes,
                self.frame_bytes()
            )));
        }
        if self.max_packet_bytes == 0 {
            return Err(AudioRelayError::invalid_config(
                "max_packet_bytes must be nonzero",
            ));
        }
        if self.transport_retry_attempts == 0 {
            return Err(AudioRelayError::invalid_config(
                "transport_retry_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
