//! Observability infrastructure for the performance engine
//!
//! Provides:
//! - Prometheus metrics (operation latency, alerts, action executions, validation cycles)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for operation durations (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    operation_duration_seconds: HistogramVec,
    operation_errors: IntCounterVec,
    system_samples: IntCounter,
    collection_errors: IntCounter,
    alerts_fired: IntCounterVec,
    actions_executed: IntCounterVec,
    validation_cycles: IntCounterVec,
    effectiveness_score: Gauge,
    strategy_level: IntGauge,
    monitoring_active: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            operation_duration_seconds: register_histogram_vec!(
                "perf_engine_operation_duration_seconds",
                "Duration of monitored operations",
                &["operation_type"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register operation_duration_seconds"),

            operation_errors: register_int_counter_vec!(
                "perf_engine_operation_errors_total",
                "Monitored operations that exited with an error",
                &["operation_type"]
            )
            .expect("Failed to register operation_errors"),

            system_samples: register_int_counter!(
                "perf_engine_system_samples_total",
                "Host metric samples collected"
            )
            .expect("Failed to register system_samples"),

            collection_errors: register_int_counter!(
                "perf_engine_collection_errors_total",
                "Failed host metric reads"
            )
            .expect("Failed to register collection_errors"),

            alerts_fired: register_int_counter_vec!(
                "perf_engine_alerts_fired_total",
                "Threshold alerts fired",
                &["metric", "severity"]
            )
            .expect("Failed to register alerts_fired"),

            actions_executed: register_int_counter_vec!(
                "perf_engine_actions_executed_total",
                "Optimization actions executed",
                &["action_type", "outcome"]
            )
            .expect("Failed to register actions_executed"),

            validation_cycles: register_int_counter_vec!(
                "perf_engine_validation_cycles_total",
                "Validation cycles run",
                &["outcome"]
            )
            .expect("Failed to register validation_cycles"),

            effectiveness_score: register_gauge!(
                "perf_engine_effectiveness_score",
                "Effectiveness score of the latest validation cycle"
            )
            .expect("Failed to register effectiveness_score"),

            strategy_level: register_int_gauge!(
                "perf_engine_strategy_level",
                "Current optimization strategy (0=conservative, 1=balanced, 2=aggressive, 3=adaptive)"
            )
            .expect("Failed to register strategy_level"),

            monitoring_active: register_int_gauge!(
                "perf_engine_monitoring_active",
                "Whether background monitoring is running"
            )
            .expect("Failed to register monitoring_active"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_operation(&self, operation_type: &str, duration_secs: f64, failed: bool) {
        let inner = self.inner();
        inner
            .operation_duration_seconds
            .with_label_values(&[operation_type])
            .observe(duration_secs);
        if failed {
            inner
                .operation_errors
                .with_label_values(&[operation_type])
                .inc();
        }
    }

    pub fn inc_system_samples(&self) {
        self.inner().system_samples.inc();
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    pub fn inc_alerts_fired(&self, metric: &str, severity: &str) {
        self.inner()
            .alerts_fired
            .with_label_values(&[metric, severity])
            .inc();
    }

    pub fn inc_actions_executed(&self, action_type: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .actions_executed
            .with_label_values(&[action_type, outcome])
            .inc();
    }

    pub fn inc_validation_cycles(&self, failed: bool) {
        let outcome = if failed { "error" } else { "ok" };
        self.inner()
            .validation_cycles
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_effectiveness_score(&self, score: f64) {
        self.inner().effectiveness_score.set(score);
    }

    pub fn set_strategy_level(&self, level: i64) {
        self.inner().strategy_level.set(level);
    }

    pub fn set_monitoring_active(&self, active: bool) {
        self.inner().monitoring_active.set(i64::from(active));
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for alerts, optimization
/// actions, strategy changes and validation cycles.
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log a threshold alert
    pub fn log_alert(&self, metric_name: &str, current: f64, threshold: f64, severity: &str) {
        match severity {
            "critical" => {
                warn!(
                    event = "threshold_alert",
                    node = %self.node_name,
                    metric = %metric_name,
                    current = current,
                    threshold = threshold,
                    severity = %severity,
                    "Critical threshold breached"
                );
            }
            _ => {
                info!(
                    event = "threshold_alert",
                    node = %self.node_name,
                    metric = %metric_name,
                    current = current,
                    threshold = threshold,
                    severity = %severity,
                    "Warning threshold breached"
                );
            }
        }
    }

    /// Log the outcome of an optimization action
    pub fn log_action_executed(
        &self,
        action_type: &str,
        success: bool,
        duration_ms: f64,
        error: Option<&str>,
    ) {
        if success {
            info!(
                event = "optimization_executed",
                node = %self.node_name,
                action_type = %action_type,
                duration_ms = duration_ms,
                "Optimization action completed"
            );
        } else {
            warn!(
                event = "optimization_failed",
                node = %self.node_name,
                action_type = %action_type,
                duration_ms = duration_ms,
                error = error.unwrap_or("unknown"),
                "Optimization action failed"
            );
        }
    }

    /// Log a strategy change
    pub fn log_strategy_change(&self, from: &str, to: &str, reason: &str) {
        info!(
            event = "strategy_changed",
            node = %self.node_name,
            from = %from,
            to = %to,
            reason = %reason,
            "Optimization strategy changed"
        );
    }

    /// Log the outcome of a validation cycle
    pub fn log_validation_cycle(
        &self,
        effectiveness_score: f64,
        within_thresholds: bool,
        regression_passed: bool,
        error: Option<&str>,
    ) {
        match error {
            None => {
                info!(
                    event = "validation_cycle",
                    node = %self.node_name,
                    effectiveness_score = effectiveness_score,
                    within_thresholds = within_thresholds,
                    regression_passed = regression_passed,
                    "Validation cycle completed"
                );
            }
            Some(error) => {
                warn!(
                    event = "validation_cycle",
                    node = %self.node_name,
                    error = %error,
                    "Validation cycle failed"
                );
            }
        }
    }

    /// Log baseline establishment
    pub fn log_baseline_set(&self, metric_count: usize) {
        info!(
            event = "baseline_set",
            node = %self.node_name,
            metric_count = metric_count,
            "Baseline metrics established"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "engine_started",
            node = %self.node_name,
            engine_version = %version,
            "Performance engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Performance engine shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        let metrics = EngineMetrics::new();

        metrics.observe_operation("conversion", 0.25, false);
        metrics.observe_operation("conversion", 0.5, true);
        metrics.inc_system_samples();
        metrics.inc_alerts_fired("cpu_percent", "warning");
        metrics.inc_actions_executed("memory_cleanup", true);
        metrics.inc_validation_cycles(false);
        metrics.set_effectiveness_score(0.8);
        metrics.set_strategy_level(1);
        metrics.set_monitoring_active(true);

        // Handles share the same global registry
        let other = EngineMetrics::new();
        other.inc_collection_errors();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name(), "test-node");
    }
}
