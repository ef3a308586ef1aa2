//! Duelnet - authoritative synchronization server binary.

use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to listen on (overrides the config file)
    port: Option<u16>,
    /// Address to bind to (overrides the config file)
    #[arg(long)]
    bind: Option<String>,
    /// Configuration file, created with defaults if missing
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Duelnet v{}", env!("CARGO_PKG_VERSION"));

    let mut config = server::Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    info!("Loaded configuration from {}", args.config.display());
    info!("  Address: {}", config.server.bind_addr());
    info!("  Capacity: {} players", config.server.capacity);
    info!(
        "  Tick: {} ms, ping every {} ms",
        config.server.tick_interval_ms, config.server.ping_interval_ms
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    server::run(config, shutdown_rx).await?;
    Ok(())
}
