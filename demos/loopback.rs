//! Live microphone-to-speaker loopback through the relay pipeline.
//!
//! Run with: `cargo run --example loopback`

use audio_relay::{AudioRelay, DeviceDuplex, ModeFlag, PcmPassthrough, RelayConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RelayConfig::default();
    let session = AudioRelay::builder()
        .config(config.clone())
        .mode(ModeFlag::loopback())
        .encoder(PcmPassthrough)
        .on_event(|event| tracing::warn!(?event, "relay event"))
        .start(|port| DeviceDuplex::open(&config, port))
        .await?;

    println!("Relaying microphone to speakers. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    let stats = session.stats();
    session.stop().await?;
    println!(
        "captured {} blocks, treated {}, underruns {}",
        stats.captures, stats.treatments, stats.playback_underruns
    );
    Ok(())
}
