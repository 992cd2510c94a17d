//! Microphone capture forwarded as UDP datagrams.
//!
//! Run with: `cargo run --example forward_udp -- 192.168.1.20:5004`
//! (defaults to 127.0.0.1:5004; receive with e.g. `nc -ul 5004 | xxd`)

use std::net::SocketAddr;

use audio_relay::{AudioRelay, DeviceDuplex, ModeFlag, PcmPassthrough, RelayConfig, UdpTransport};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let peer: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5004".to_string())
        .parse()?;
    let transport = UdpTransport::connect("0.0.0.0:0", peer).await?;

    let config = RelayConfig::default();
    let session = AudioRelay::builder()
        .config(config.clone())
        .mode(ModeFlag::forwarding())
        .encoder(PcmPassthrough)
        .transport(transport)
        .on_event(|event| tracing::warn!(?event, "relay event"))
        .start(|port| DeviceDuplex::open(&config, port))
        .await?;

    println!("Forwarding microphone audio to {peer}. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    let stats = session.stats();
    session.stop().await?;
    println!(
        "captured {} blocks, sent {} packets ({} failed)",
        stats.captures, stats.transport_sends, stats.transport_failures
    );
    Ok(())
}
