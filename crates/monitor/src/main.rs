//! Performance monitor - adaptive performance monitoring service
//!
//! Samples host and operation metrics, alerts on thresholds, runs
//! optimization actions and validates their effect on a fixed interval.

use anyhow::Result;
use perf_engine::{
    collector::SysinfoSource, observability::StructuredLogger, validation::InMemoryStore,
};
use perf_monitor::{api, build_state, config::MonitorSettings};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting perf-monitor");

    let settings = MonitorSettings::load()?;
    info!(
        node_name = %settings.node_name,
        api_port = settings.api_port,
        sample_interval_secs = settings.sample_interval_secs,
        validation_interval_secs = settings.validation_interval_secs,
        "Monitor configured"
    );

    let logger = StructuredLogger::new(&settings.node_name);
    logger.log_startup(MONITOR_VERSION);

    let state = build_state(
        &settings,
        Arc::new(SysinfoSource::new()),
        Arc::new(InMemoryStore::new()),
    )
    .await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    state.monitor.start_monitoring();

    let validation_handle = state
        .integrator
        .as_ref()
        .map(|integrator| tokio::spawn(Arc::clone(integrator).run(shutdown_tx.subscribe())));

    let api_handle = tokio::spawn(api::serve(
        settings.api_port,
        Arc::clone(&state),
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    state.monitor.stop_monitoring().await;

    if let Some(handle) = validation_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Validation loop ended abnormally");
        }
    }
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server exited with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
