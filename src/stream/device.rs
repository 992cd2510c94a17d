//! CPAL duplex backend.
//!
//! Drives the default input and output devices and adapts cpal's
//! arbitrary-length callback slices to the pipeline's fixed block size:
//! the input callback accumulates samples into a staging block and invokes
//! the capture handler once per full block; the output callback refills its
//! staging block from the playback handler as it drains. Both callbacks do
//! bounded work and never allocate after warm-up.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig as CpalStreamConfig};

use crate::pipeline::StreamPort;
use crate::stream::DuplexStream;
use crate::{AudioRelayError, ClockRole, RelayConfig};

/// Symmetric i16 max for f32 conversion (avoids asymmetric clipping).
const I16_MAX_SYMMETRIC: f32 = i16::MAX as f32;
/// Minimum i16 as f32 for clamping.
const I16_MIN_F32: f32 = i16::MIN as f32;
/// Maximum i16 as f32 for clamping.
const I16_MAX_F32: f32 = i16::MAX as f32;

/// Duplex stream over the default cpal input and output devices.
///
/// The streams are built at open time and start exchanging audio when
/// [`start_clocks`](DuplexStream::start_clocks) is called. Dropping the
/// value stops and releases both devices.
pub struct DeviceDuplex {
    input: Stream,
    output: Stream,
}

impl DeviceDuplex {
    /// Opens the default input and output devices at the configured format.
    ///
    /// # Errors
    ///
    /// Returns [`AudioRelayError::StreamOpenFailed`] if either device is
    /// missing, uses an unsupported sample format, or refuses the stream
    /// configuration.
    pub fn open(config: &RelayConfig, port: StreamPort) -> Result<Self, AudioRelayError> {
        if config.bits_per_sample != 16 {
            return Err(AudioRelayError::stream_open(
                "device backend supports 16-bit samples only",
            ));
        }
        if config.clock_role != ClockRole::Controller {
            return Err(AudioRelayError::stream_open(
                "device backend cannot run as clock peripheral",
            ));
        }

        let host = cpal::default_host();
        let input_device = host
            .default_input_device()
            .ok_or_else(|| AudioRelayError::stream_open("no default input device"))?;
        let output_device = host
            .default_output_device()
            .ok_or_else(|| AudioRelayError::stream_open("no default output device"))?;

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let input = build_input(&input_device, &cpal_config, port.clone(), config.buffer_bytes)?;
        let output = build_output(&output_device, &cpal_config, port, config.buffer_bytes)?;

        tracing::info!(
            input = %input_device.name().unwrap_or_else(|_| "unknown".to_string()),
            output = %output_device.name().unwrap_or_else(|_| "unknown".to_string()),
            rate = config.sample_rate,
            channels = config.channels,
            "device duplex opened"
        );

        Ok(Self { input, output })
    }
}

impl DuplexStream for DeviceDuplex {
    fn start_clocks(&mut self) -> Result<(), AudioRelayError> {
        self.input
            .play()
            .map_err(|e| AudioRelayError::stream_open(format!("input start: {e}")))?;
        self.output
            .play()
            .map_err(|e| AudioRelayError::stream_open(format!("output start: {e}")))?;
        Ok(())
    }

    fn stop_clocks(&mut self) -> Result<(), AudioRelayError> {
        // Pause is unsupported on some backends; dropping the streams
        // releases the devices either way.
        if let Err(e) = self.input.pause() {
            tracing::warn!(error = %e, "input pause failed");
        }
        if let Err(e) = self.output.pause() {
            tracing::warn!(error = %e, "output pause failed");
        }
        Ok(())
    }
}

fn backend_err(e: impl std::fmt::Display) -> AudioRelayError {
    AudioRelayError::stream_open(e.to_string())
}

fn build_input(
    device: &Device,
    config: &CpalStreamConfig,
    port: StreamPort,
    buffer_bytes: usize,
) -> Result<Stream, AudioRelayError> {
    let format = device
        .default_input_config()
        .map_err(backend_err)?
        .sample_format();

    let err_port = port.clone();
    let err_fn = move |e: cpal::StreamError| err_port.stream_error(&e.to_string());

    let mut staging: Vec<u8> = Vec::with_capacity(buffer_bytes);
    let stream = match format {
        SampleFormat::I16 => device
            .build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        staging.extend_from_slice(&sample.to_le_bytes());
                        if staging.len() == buffer_bytes {
                            if let Err(e) = port.capture_complete(&staging) {
                                tracing::error!(error = %e, "capture handler failed");
                            }
                            staging.clear();
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(backend_err)?,
        SampleFormat::F32 => device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        // Inline conversion to keep the audio callback lean
                        let converted =
                            (sample * I16_MAX_SYMMETRIC).clamp(I16_MIN_F32, I16_MAX_F32) as i16;
                        staging.extend_from_slice(&converted.to_le_bytes());
                        if staging.len() == buffer_bytes {
                            if let Err(e) = port.capture_complete(&staging) {
                                tracing::error!(error = %e, "capture handler failed");
                            }
                            staging.clear();
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(backend_err)?,
        format => {
            return Err(AudioRelayError::stream_open(format!(
                "unsupported input sample format: {format:?}"
            )));
        }
    };

    Ok(stream)
}

fn build_output(
    device: &Device,
    config: &CpalStreamConfig,
    port: StreamPort,
    buffer_bytes: usize,
) -> Result<Stream, AudioRelayError> {
    let format = device
        .default_output_config()
        .map_err(backend_err)?
        .sample_format();

    let err_port = port.clone();
    let err_fn = move |e: cpal::StreamError| err_port.stream_error(&e.to_string());

    let mut block = vec![0u8; buffer_bytes];
    // Start exhausted so the first callback fetches a fresh block
    let mut cursor = buffer_bytes;
    let stream = match format {
        SampleFormat::I16 => device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        if cursor == buffer_bytes {
                            if let Err(e) = port.playback_complete(&mut block) {
                                tracing::error!(error = %e, "playback handler failed");
                            }
                            cursor = 0;
                        }
                        *sample = i16::from_le_bytes([block[cursor], block[cursor + 1]]);
                        cursor += 2;
                    }
                },
                err_fn,
                None,
            )
            .map_err(backend_err)?,
        SampleFormat::F32 => device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        if cursor == buffer_bytes {
                            if let Err(e) = port.playback_complete(&mut block) {
                                tracing::error!(error = %e, "playback handler failed");
                            }
                            cursor = 0;
                        }
                        let raw = i16::from_le_bytes([block[cursor], block[cursor + 1]]);
                        *sample = f32::from(raw) / 32768.0;
                        cursor += 2;
                    }
                },
                err_fn,
                None,
            )
            .map_err(backend_err)?,
        format => {
            return Err(AudioRelayError::stream_open(format!(
                "unsupported output sample format: {format:?}"
            )));
        }
    };

    Ok(stream)
}
