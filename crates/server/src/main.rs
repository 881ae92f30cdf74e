//! usage-server - charging-station usage tier prediction service
//!
//! Loads the pipeline artifact once at startup and serves predictions,
//! health, readiness and Prometheus metrics over HTTP.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usage_lib::observability::StructuredLogger;
use usage_server::{api, config::ServerConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        model_path = %config.model_path.display(),
        bind = %config.bind_addr(),
        "Server configured"
    );

    let state = Arc::new(api::AppState::initialize(&config.model_path).await);
    if !state.inference.state().is_ready() {
        warn!("Starting without a pipeline; /predict will answer 500 until restart");
    }

    let logger = StructuredLogger::new("usage-server");
    logger.log_startup(SERVER_VERSION, &config.bind_addr());

    api::serve(&config.bind_addr(), state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
