//! roll-relay: pass-through proxy for the upstream result feed.
//!
//! Serves `GET /api/results` with permissive CORS so browser clients can read
//! the feed, relaying the upstream JSON body verbatim.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use roll_signal::RELAY_RESULTS_PATH;
use roll_signal::config::{AppConfig, CONFIG_PATH};
use roll_signal::relay::{self, RelayState};

#[derive(Parser)]
#[command(name = "roll-relay", about = "CORS relay for the result feed")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overrides relay.bind
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;
    let bind = args.bind.unwrap_or_else(|| config.relay.bind.clone());

    let state = Arc::new(RelayState::new(&config.relay)?);
    let app = relay::router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(
        "Relay listening on {bind}, {RELAY_RESULTS_PATH} -> {}",
        config.relay.upstream_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
