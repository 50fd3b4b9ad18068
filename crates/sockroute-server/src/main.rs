//! # sockroute server
//!
//! WebSocket server that dispatches JSON envelopes through sockroute routes.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! sockroute
//!
//! # Run with a specific config file
//! SOCKROUTE_CONFIG=/path/to/sockroute.toml sockroute
//!
//! # Override single settings
//! SOCKROUTE_PORT=9000 SOCKROUTE_LIMITS__MAX_CONNECTIONS=500 sockroute
//! ```

mod app;
mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sockroute=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    tracing::info!("Starting sockroute server on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
