//! Performance monitor service
//!
//! Wires the engine's collector, monitor, optimizer and validation loop
//! together and exposes them over an HTTP control plane.

pub mod actions;
pub mod api;
pub mod config;

use anyhow::Result;
use api::AppState;
use config::MonitorSettings;
use perf_engine::{
    alerting::LoggingAlertCallback,
    collector::{MetricsCollector, SystemMetricsSource},
    health::{components, HealthRegistry},
    monitor::PerformanceMonitor,
    observability::StructuredLogger,
    optimizer::AdaptiveOptimizer,
    validation::{KeyValueStore, OptimizationIntegrator},
};
use std::sync::Arc;
use tracing::info;

/// Build the monitor, the integrator and the shared API state
pub async fn build_state(
    settings: &MonitorSettings,
    source: Arc<dyn SystemMetricsSource>,
    store: Arc<dyn KeyValueStore>,
) -> Result<Arc<AppState>> {
    let logger = StructuredLogger::new(&settings.node_name);

    let collector = Arc::new(MetricsCollector::new(source, settings.collector_config()));
    let optimizer = Arc::new(AdaptiveOptimizer::new(logger.clone()));
    let monitor = Arc::new(PerformanceMonitor::new(
        collector,
        optimizer,
        logger.clone(),
        settings.monitor_config(),
    ));

    monitor.register_alert_callback(Arc::new(LoggingAlertCallback::new(logger)));
    actions::register_builtin_actions(&monitor, settings);
    if settings.default_thresholds {
        for threshold in actions::default_thresholds(settings) {
            monitor.register_threshold(threshold)?;
        }
    }

    let integrator = Arc::new(OptimizationIntegrator::new(
        Arc::clone(&monitor),
        store,
        settings.integrator_config(),
    ));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MONITOR).await;
    health_registry.register(components::OPTIMIZER).await;
    health_registry.register(components::INTEGRATOR).await;
    health_registry.register(components::STORE).await;

    info!(
        node_name = %settings.node_name,
        actions = monitor.optimizer().action_count(),
        thresholds = monitor.thresholds().len(),
        "Performance monitor assembled"
    );

    Ok(Arc::new(AppState::new(
        monitor,
        Some(integrator),
        health_registry,
    )))
}
