//! # audio-relay
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time duplex audio relay over a fixed transaction pool.
//!
//! `audio-relay` rotates a fixed set of fixed-size buffers between a
//! hardware capture stage, a software encode/dispatch worker, and a
//! hardware playback (or network-forwarding) stage. Nothing is allocated
//! in steady state, transactions are treated strictly in capture order,
//! and none is ever lost: every buffer cycles forever.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audio_relay::{AudioRelay, DeviceDuplex, Mode, ModeFlag, PcmPassthrough, RelayConfig, UdpTransport};
//!
//! let config = RelayConfig::default();          // 16kHz stereo, 32 buffers
//! let mode = ModeFlag::forwarding();
//! let transport = UdpTransport::connect("0.0.0.0:0", "192.168.1.20:5004".parse()?).await?;
//!
//! let session = AudioRelay::builder()
//!     .config(config.clone())
//!     .mode(mode.clone())
//!     .encoder(PcmPassthrough)                  // plug your codec here
//!     .transport(transport)
//!     .on_event(|e| tracing::warn!(?e, "relay event"))
//!     .start(|port| DeviceDuplex::open(&config, port))
//!     .await?;
//!
//! // Flip to loopback at any time; the core only reads the flag
//! mode.set(Mode::Loopback);
//!
//! session.stop().await?;
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict boundary between two execution domains:
//!
//! - **Completion-handler domain**: the hardware layer's notification
//!   context. Handlers do bounded work only - one fixed-size copy and an
//!   index relink under a short lock, plus a semaphore permit release.
//! - **Worker domain**: a schedulable task that waits on the permit,
//!   encodes, and dispatches. Encoding and transport I/O never happen
//!   under the lock; a slow transport intentionally throttles capture by
//!   delaying buffer recycling.
//!
//! Transactions move `CaptureReady -> Pending -> {PlaybackReady | CaptureReady}`
//! and the three queues always account for every buffer in the pool.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod encode;
mod error;
mod event;
mod pipeline;
mod pool;
mod session;
pub mod stream;
mod transport;

pub use builder::{AudioRelay, AudioRelayBuilder};
pub use config::{ClockRole, Mode, ModeFlag, RelayConfig};
pub use encode::{EncodeError, Encoder, PcmPassthrough};
pub use error::{AudioRelayError, TransportError};
pub use event::{event_callback, EventCallback, RelayEvent};
pub use pipeline::{StreamPort, TreatmentWorker};
pub use pool::PoolCensus;
pub use session::{RelayStats, Session};
pub use stream::{DeviceDuplex, DuplexStream, MockDuplex};
pub use transport::{TransportSink, UdpTransport};
