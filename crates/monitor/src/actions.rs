//! Built-in optimization actions and default thresholds

use crate::config::MonitorSettings;
use perf_engine::alerting::Threshold;
use perf_engine::models::names;
use perf_engine::monitor::PerformanceMonitor;
use perf_engine::optimizer::{handler_fn, ActionOutcome, OptimizationAction};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Operation samples older than this are released by `memory_cleanup`
const CLEANUP_RETENTION_MINUTES: u64 = 60;

/// Register the memory, cache and database actions with the monitor
pub fn register_builtin_actions(monitor: &PerformanceMonitor, settings: &MonitorSettings) {
    let collector = Arc::clone(monitor.collector());
    let memory_limit = settings.memory_limit;
    monitor.register_action(
        OptimizationAction::new(
            "memory_cleanup",
            "Release aged operation samples and shrink buffers",
            8,
            handler_fn(move || {
                let collector = Arc::clone(&collector);
                async move {
                    let before = collector.metric_count();
                    let removed = collector.compact(CLEANUP_RETENTION_MINUTES);
                    let improvement = if before == 0 {
                        0.0
                    } else {
                        removed as f64 / before as f64
                    };

                    let mut outcome = ActionOutcome::new();
                    outcome.insert("samples_removed".to_string(), json!(removed));
                    outcome.insert("improvement".to_string(), json!(improvement));
                    Ok(outcome)
                }
            }),
        )
        .with_condition(move |m| m.get(names::MEMORY_PERCENT).unwrap_or(0.0) > memory_limit)
        .with_cooldown_minutes(5),
    );

    let cpu_limit = settings.cpu_limit;
    let cache_floor = settings.cache_hit_rate_min;
    monitor.register_action(
        OptimizationAction::new(
            "cache_optimization",
            "Warm frequently accessed keys and evict cold entries",
            6,
            handler_fn(|| async {
                info!(action = "cache_optimization", "Cache optimization requested");
                Ok(requested("cache_warmup"))
            }),
        )
        .with_condition(move |m| {
            m.get(names::CPU_PERCENT).unwrap_or(0.0) > cpu_limit
                || m.get(names::CACHE_HIT_RATE).is_some_and(|rate| rate < cache_floor)
        })
        .with_cooldown_minutes(10),
    );

    let response_time_limit = settings.response_time_limit_ms;
    monitor.register_action(
        OptimizationAction::new(
            "db_optimization",
            "Resize the database connection pool",
            5,
            handler_fn(|| async {
                info!(action = "db_optimization", "Database pool resize requested");
                Ok(requested("pool_resize"))
            }),
        )
        .with_condition(move |m| m.get(names::RESPONSE_TIME).unwrap_or(0.0) > response_time_limit)
        .with_cooldown_minutes(15),
    );
}

fn requested(operation: &str) -> ActionOutcome {
    let mut outcome = ActionOutcome::new();
    outcome.insert("operation".to_string(), json!(operation));
    outcome.insert("status".to_string(), json!("requested"));
    outcome
}

/// Thresholds matching the configured limits
pub fn default_thresholds(settings: &MonitorSettings) -> Vec<Threshold> {
    vec![
        Threshold::new(names::CPU_PERCENT, settings.cpu_limit, settings.cpu_limit.max(95.0)),
        Threshold::new(
            names::MEMORY_PERCENT,
            settings.memory_limit,
            settings.memory_limit.max(95.0),
        ),
        Threshold::new(
            names::RESPONSE_TIME,
            settings.response_time_limit_ms,
            settings.response_time_limit_ms * 2.5,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_engine::collector::{CollectorConfig, MetricsCollector, StaticSource};
    use perf_engine::models::{MetricSnapshot, PerformanceMetric, SystemSample};
    use perf_engine::monitor::MonitorConfig;
    use perf_engine::observability::StructuredLogger;
    use perf_engine::optimizer::AdaptiveOptimizer;

    fn monitor() -> PerformanceMonitor {
        let logger = StructuredLogger::new("test-node");
        PerformanceMonitor::new(
            Arc::new(MetricsCollector::new(
                Arc::new(StaticSource::new(SystemSample::default())),
                CollectorConfig::default(),
            )),
            Arc::new(AdaptiveOptimizer::new(logger.clone())),
            logger,
            MonitorConfig::default(),
        )
    }

    #[test]
    fn test_builtin_actions_registered() {
        let monitor = monitor();
        register_builtin_actions(&monitor, &MonitorSettings::default());

        let types: Vec<String> = monitor
            .optimizer()
            .actions()
            .into_iter()
            .map(|a| a.action_type)
            .collect();
        assert_eq!(types, vec!["memory_cleanup", "cache_optimization", "db_optimization"]);
    }

    #[test]
    fn test_conditions_follow_limits() {
        let monitor = monitor();
        register_builtin_actions(&monitor, &MonitorSettings::default());

        let pressured = MetricSnapshot::new()
            .with(names::MEMORY_PERCENT, 91.0)
            .with(names::CACHE_HIT_RATE, 0.4);
        let types: Vec<String> = monitor
            .optimizer()
            .evaluate_opportunities(&pressured)
            .into_iter()
            .map(|a| a.action_type)
            .collect();
        assert_eq!(types, vec!["memory_cleanup", "cache_optimization"]);
    }

    #[tokio::test]
    async fn test_memory_cleanup_reports_improvement() {
        let monitor = monitor();
        register_builtin_actions(&monitor, &MonitorSettings::default());
        monitor
            .collector()
            .record_metric(PerformanceMetric::new("conversion", "1", 10.0));

        let record = monitor.optimizer().execute("memory_cleanup").await.unwrap();
        assert!(record.success);
        assert_eq!(record.result.unwrap()["samples_removed"], 0);
    }

    #[test]
    fn test_default_thresholds_are_valid() {
        for threshold in default_thresholds(&MonitorSettings::default()) {
            threshold.validate().unwrap();
        }
    }
}
