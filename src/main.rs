//! Signal Relay Server
//!
//! Run with: cargo run
//!
//! # Configuration
//!
//! Config file (TOML) is searched in the platform config dir,
//! `/etc/signal-relay/config.toml`, then `./config.toml`.
//!
//! Environment variables override the file:
//! - `RELAY_HOST`: Host to bind to (default: 0.0.0.0)
//! - `RELAY_PORT`: Port to listen on (default: 8080)
//! - `RELAY_MAX_CONNECTIONS`: Connection cap (default: 1024)
//! - `RELAY_LOG_LEVEL`: Log level (default: info)
//! - `RELAY_LOG_FORMAT`: "pretty" or "json" (default: pretty)
//!
//! CLI flags override both.

use anyhow::Result;
use clap::Parser;
use signal_relay::config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "signal-relay", version, about = "WebSocket broadcast relay for WebRTC signaling")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The subscriber is not installed yet, so config loading must stay
    // silent; the chosen source is logged once tracing is up.
    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match &config_path {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    init_tracing(&config);

    match &config_path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("No config file found, using defaults with environment overrides"),
    }

    tracing::info!("Starting signal relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Listening on {} (max {} connections)",
        config.server.addr(),
        config.server.max_connections
    );

    signal_relay::api::serve(config).await?;

    tracing::info!("Signal relay stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("signal_relay={},tower_http=warn", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
