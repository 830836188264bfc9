//! Rustrade server: headless trading agent binary.
//!
//! Runs the cycle scheduler (collector -> arbiter -> supervisor ->
//! executor) against the configured exchange adapter and pushes
//! metrics as structured JSON logs to stdout -- no HTTP server, no
//! incoming connections.
//!
//! # Environment
//! `HYPERLIQUID_MAIN_ADDRESS` is required; everything else documented
//! on `rustrade::config::Config::from_env` falls back to spec.md's
//! defaults.
//!
//! # Exit codes
//! `0` on a clean shutdown, `1` if the startup data-health check finds
//! no usable symbol.

use anyhow::Result;
use rustrade::application::system::Application;
use rustrade::config::Config;
use rustrade::infrastructure::observability::{Metrics, MetricsReporter};
use tracing::{Level, error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rustrade starting");

    let config = Config::from_env()?;
    info!(symbols = ?config.symbols, cycle_interval_secs = config.cycle_interval_secs, "configuration loaded");

    let mut app = Application::build(config.clone()).await?;

    if !app.data_health_ok().await {
        error!("startup data-health check failed: no configured symbol cleared the data-quality floor");
        std::process::exit(1);
    }
    info!("startup data-health check passed");

    let reporter_state = app.reporter_state();
    let metrics = Metrics::new()?;
    let reporter = MetricsReporter::new(reporter_state, metrics, config.metrics_interval_secs);
    tokio::spawn(async move {
        reporter.run().await;
    });
    info!(interval_secs = config.metrics_interval_secs, "metrics reporter started");

    let handle = app.start().await?;
    info!("cycle scheduler running, press ctrl-c to shut down");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
