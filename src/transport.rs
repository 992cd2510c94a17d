//! Transport sink boundary and the UDP implementation.
//!
//! A [`TransportSink`] is the destination for encoded payloads in
//! forwarding mode. Sends are best-effort: a failure is reported via
//! [`RelayEvent::TransportFailed`](crate::RelayEvent::TransportFailed) and
//! the transaction is recycled regardless.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::{AudioRelayError, TransportError};

/// A destination for encoded audio payloads.
///
/// # Implementation Notes
///
/// - `send` takes `&self` - use interior mutability if needed
/// - `send` runs on the worker task; a slow implementation directly
///   throttles how fast buffers return to capture
/// - Errors are recoverable; the worker may retry per its configuration
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Sends one encoded payload.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Connected-UDP transport sink.
///
/// One datagram per encoded packet. The socket is connected at
/// construction, so a vanished peer shows up as a send error rather than
/// silence.
///
/// # Example
///
/// ```ignore
/// let transport = UdpTransport::connect("0.0.0.0:0", "192.168.1.20:5004".parse()?).await?;
/// ```
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Binds a local socket and connects it to `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`AudioRelayError::TransportInitFailed`] if the bind or
    /// connect fails.
    pub async fn connect(bind: &str, peer: SocketAddr) -> Result<Self, AudioRelayError> {
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| AudioRelayError::TransportInitFailed {
                reason: format!("bind {bind}: {e}"),
            })?;
        socket
            .connect(peer)
            .await
            .map_err(|e| AudioRelayError::TransportInitFailed {
                reason: format!("connect {peer}: {e}"),
            })?;

        Ok(Self { socket, peer })
    }

    /// The peer this transport sends to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl TransportSink for UdpTransport {
    fn name(&self) -> &str {
        "udp"
    }

    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self
            .socket
            .send(payload)
            .await
            .map_err(|e| TransportError::send_failed(e.to_string()))?;
        if sent != payload.len() {
            return Err(TransportError::send_failed(format!(
                "short send: {sent} of {} bytes",
                payload.len()
            )));
        }
        Ok(())
    }
}
