//! Periodic validation of optimization effectiveness
//!
//! Each cycle collects current metrics, checks them against limits, scores
//! them against the persisted baseline, runs the regression probes, then
//! triggers corrective actions or escalates the strategy and persists the
//! result.

use super::effectiveness::{effectiveness_score, ThresholdValidation, ValidationLimits};
use super::regression::{default_probes, RegressionProbe, RegressionReport};
use super::store::{keys, KeyValueStore};
use crate::error::{MonitorError, Result};
use crate::models::{names, MetricSnapshot};
use crate::monitor::PerformanceMonitor;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::optimizer::{ActionExecutionRecord, OptimizationStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Score reported by the cycle that establishes the baseline
pub const INITIAL_EFFECTIVENESS_SCORE: f64 = 0.8;

/// Below this the strategy escalates to balanced
const BALANCED_ESCALATION_SCORE: f64 = 0.5;

/// Below this the strategy escalates to aggressive
const AGGRESSIVE_ESCALATION_SCORE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct IntegratorConfig {
    pub interval: Duration,
    pub limits: ValidationLimits,
    /// Directory receiving one JSON report per cycle
    pub report_dir: Option<PathBuf>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            limits: ValidationLimits::default(),
            report_dir: None,
        }
    }
}

/// Optimizer state captured with each validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub strategy: OptimizationStrategy,
    pub patterns_learned: usize,
    pub registered_actions: usize,
    pub monitoring_active: bool,
}

/// Outcome of one validation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub timestamp: DateTime<Utc>,
    pub system_metrics: MetricSnapshot,
    pub optimization_status: Option<OptimizationStatus>,
    pub threshold_validation: ThresholdValidation,
    pub effectiveness_score: f64,
    pub regression_results: RegressionReport,
    pub within_thresholds: bool,
    pub needs_adjustment: bool,
    #[serde(default)]
    pub actions_triggered: Vec<ActionExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn failed(error: String) -> Self {
        Self {
            timestamp: Utc::now(),
            system_metrics: MetricSnapshot::new(),
            optimization_status: None,
            threshold_validation: ThresholdValidation::default(),
            effectiveness_score: 0.0,
            regression_results: RegressionReport::default(),
            within_thresholds: false,
            needs_adjustment: true,
            actions_triggered: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Action triggered for a high-severity violation of a metric
fn corrective_action(metric: &str) -> Option<&'static str> {
    match metric {
        names::CPU_PERCENT => Some("cache_optimization"),
        names::MEMORY_PERCENT => Some("memory_cleanup"),
        names::RESPONSE_TIME => Some("db_optimization"),
        _ => None,
    }
}

/// Drives validation cycles against a monitor and a key-value store
pub struct OptimizationIntegrator {
    monitor: Arc<PerformanceMonitor>,
    store: Arc<dyn KeyValueStore>,
    probes: RwLock<Vec<Arc<dyn RegressionProbe>>>,
    config: IntegratorConfig,
    logger: StructuredLogger,
    metrics: EngineMetrics,
    /// Serializes manual and periodic cycles
    cycle_lock: Mutex<()>,
}

impl OptimizationIntegrator {
    /// Integrator with the default latency probe battery
    pub fn new(
        monitor: Arc<PerformanceMonitor>,
        store: Arc<dyn KeyValueStore>,
        config: IntegratorConfig,
    ) -> Self {
        let logger = monitor.logger().clone();
        Self {
            monitor,
            store,
            probes: RwLock::new(default_probes()),
            config,
            logger,
            metrics: EngineMetrics::new(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.config.limits
    }

    pub fn register_probe(&self, probe: Arc<dyn RegressionProbe>) {
        self.probes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(probe);
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Run cycles on the configured interval until shutdown
    ///
    /// A cycle already in progress when shutdown arrives runs to completion.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting validation loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down validation loop");
                    break;
                }
            }
        }
    }

    /// Run one validation cycle and persist its result
    ///
    /// Failures inside the cycle are returned as a failed result.
    pub async fn run_once(&self) -> ValidationResult {
        let _cycle = self.cycle_lock.lock().await;

        let result = match self.cycle().await {
            Ok(result) => result,
            Err(e) => {
                let failed = ValidationResult::failed(e.to_string());
                if let Err(persist_err) = self.persist(&failed).await {
                    debug!(error = %persist_err, "Could not persist failed validation result");
                }
                failed
            }
        };

        self.metrics.inc_validation_cycles(result.is_error());
        if !result.is_error() {
            self.metrics.set_effectiveness_score(result.effectiveness_score);
        }
        self.logger.log_validation_cycle(
            result.effectiveness_score,
            result.within_thresholds,
            result.regression_results.passed,
            result.error.as_deref(),
        );

        result
    }

    async fn cycle(&self) -> Result<ValidationResult> {
        let current = self.monitor.current_snapshot().await;
        let threshold_validation = self.config.limits.check(&current);
        let effectiveness_score = self
            .effectiveness(&current, threshold_validation.passed)
            .await?;
        let regression_results = self.run_probes().await;

        let actions_triggered = self.trigger_corrections(&threshold_validation).await;
        self.adjust_strategy(effectiveness_score);

        let within_thresholds = threshold_validation.passed;
        let needs_adjustment = !within_thresholds
            || !regression_results.passed
            || effectiveness_score < BALANCED_ESCALATION_SCORE;

        let optimizer = self.monitor.optimizer();
        let result = ValidationResult {
            timestamp: Utc::now(),
            system_metrics: current,
            optimization_status: Some(OptimizationStatus {
                strategy: optimizer.strategy(),
                patterns_learned: optimizer.patterns_learned(),
                registered_actions: optimizer.action_count(),
                monitoring_active: self.monitor.is_monitoring(),
            }),
            threshold_validation,
            effectiveness_score,
            regression_results,
            within_thresholds,
            needs_adjustment,
            actions_triggered,
            error: None,
        };

        self.persist(&result).await?;
        Ok(result)
    }

    /// Score against the baseline, establishing it on the first cycle
    async fn effectiveness(&self, current: &MetricSnapshot, thresholds_passed: bool) -> Result<f64> {
        match self.baseline().await? {
            Some(baseline) => Ok(effectiveness_score(&baseline, current, thresholds_passed)),
            None => {
                self.store
                    .set(
                        keys::BASELINE,
                        serde_json::to_value(current)?,
                        keys::BASELINE_TTL,
                    )
                    .await?;
                self.logger.log_baseline_set(current.len());
                Ok(INITIAL_EFFECTIVENESS_SCORE)
            }
        }
    }

    async fn run_probes(&self) -> RegressionReport {
        let probes: Vec<Arc<dyn RegressionProbe>> = self
            .probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut results = Vec::with_capacity(probes.len());
        for probe in probes {
            results.push(probe.run(self.monitor.collector()).await);
        }
        RegressionReport::from_results(results)
    }

    /// Execute the corrective action for each high-severity violation
    ///
    /// Unregistered actions and actions still cooling down are skipped.
    async fn trigger_corrections(&self, validation: &ThresholdValidation) -> Vec<ActionExecutionRecord> {
        let optimizer = self.monitor.optimizer();
        let mut records = Vec::new();

        for violation in validation.high_severity() {
            let Some(action_type) = corrective_action(&violation.metric) else {
                continue;
            };
            if optimizer.is_cooling_down(action_type) {
                debug!(action_type = %action_type, "Corrective action cooling down");
                continue;
            }

            match optimizer.execute(action_type).await {
                Ok(record) => records.push(record),
                Err(MonitorError::NotFound { .. }) => {
                    debug!(action_type = %action_type, "No corrective action registered");
                }
                Err(e) => warn!(action_type = %action_type, error = %e, "Corrective action failed"),
            }
        }

        records
    }

    fn adjust_strategy(&self, score: f64) {
        let optimizer = self.monitor.optimizer();
        let target = if score < AGGRESSIVE_ESCALATION_SCORE {
            OptimizationStrategy::Aggressive
        } else if score < BALANCED_ESCALATION_SCORE {
            OptimizationStrategy::Balanced
        } else {
            return;
        };

        optimizer.escalate(target, &format!("effectiveness score {score:.2}"));
    }

    async fn persist(&self, result: &ValidationResult) -> Result<()> {
        let value = serde_json::to_value(result)?;
        self.store
            .set(keys::LATEST_RESULT, value.clone(), keys::LATEST_RESULT_TTL)
            .await?;

        let mut history = self.load_history().await?;
        history.push(value);
        let excess = history.len().saturating_sub(keys::HISTORY_LIMIT);
        history.drain(..excess);
        self.store
            .set(
                keys::HISTORY,
                serde_json::Value::Array(history),
                keys::HISTORY_TTL,
            )
            .await?;

        if let Some(dir) = &self.config.report_dir {
            self.write_report(dir, result).await?;
        }
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<serde_json::Value>> {
        match self.store.get(keys::HISTORY).await? {
            Some(serde_json::Value::Array(entries)) => Ok(entries),
            Some(_) => {
                warn!("Discarding malformed validation history");
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_report(&self, dir: &Path, result: &ValidationResult) -> Result<()> {
        let path = dir.join(format!(
            "validation_{}.json",
            result.timestamp.format("%Y%m%dT%H%M%S%.3fZ")
        ));
        let body = serde_json::to_vec_pretty(result)?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| MonitorError::ValidationCycle(format!("creating {}: {e}", dir.display())))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| MonitorError::ValidationCycle(format!("writing {}: {e}", path.display())))?;

        debug!(path = %path.display(), "Wrote validation report");
        Ok(())
    }

    pub async fn baseline(&self) -> Result<Option<MetricSnapshot>> {
        match self.store.get(keys::BASELINE).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Forget the baseline so the next cycle establishes a new one
    pub async fn reset_baseline(&self) -> Result<bool> {
        let removed = self.store.delete(keys::BASELINE).await?;
        info!(removed = removed, "Validation baseline reset");
        Ok(removed)
    }

    pub async fn latest(&self) -> Result<Option<ValidationResult>> {
        match self.store.get(keys::LATEST_RESULT).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Persisted validation results, newest first
    pub async fn history(&self, limit: usize) -> Result<Vec<ValidationResult>> {
        self.load_history()
            .await?
            .into_iter()
            .rev()
            .take(limit)
            .map(|value| serde_json::from_value(value).map_err(MonitorError::from))
            .collect()
    }

    /// Execute an optimization action on demand, ignoring its cooldown
    pub async fn trigger_optimization(&self, action_type: &str) -> Result<ActionExecutionRecord> {
        info!(action_type = %action_type, "Manual optimization triggered");
        self.monitor.optimizer().execute(action_type).await
    }

    /// Whether the backing store answers
    pub async fn store_reachable(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorConfig, MetricsCollector, StaticSource};
    use crate::models::SystemSample;
    use crate::monitor::MonitorConfig;
    use crate::optimizer::{handler_fn, ActionOutcome, AdaptiveOptimizer, OptimizationAction};
    use crate::validation::InMemoryStore;

    fn host(cpu_percent: f64, memory_percent: f64) -> SystemSample {
        SystemSample {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent,
            memory_mb: 4096.0,
            disk_usage: 50.0,
            network_io: 0,
            process_count: 80,
        }
    }

    struct Harness {
        source: Arc<StaticSource>,
        store: Arc<InMemoryStore>,
        integrator: OptimizationIntegrator,
    }

    fn harness(config: IntegratorConfig) -> Harness {
        let source = Arc::new(StaticSource::new(host(40.0, 50.0)));
        let logger = StructuredLogger::new("test-node");
        let collector = Arc::new(MetricsCollector::new(
            Arc::clone(&source) as Arc<dyn crate::collector::SystemMetricsSource>,
            CollectorConfig::default(),
        ));
        let optimizer = Arc::new(AdaptiveOptimizer::new(logger.clone()));
        let monitor = Arc::new(PerformanceMonitor::new(
            collector,
            optimizer,
            logger,
            MonitorConfig {
                auto_optimize: false,
                ..Default::default()
            },
        ));
        let store = Arc::new(InMemoryStore::new());
        let integrator = OptimizationIntegrator::new(
            monitor,
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            config,
        );
        Harness {
            source,
            store,
            integrator,
        }
    }

    #[tokio::test]
    async fn test_first_cycle_sets_baseline() {
        let h = harness(IntegratorConfig::default());

        let result = h.integrator.run_once().await;

        assert!(!result.is_error());
        assert_eq!(result.effectiveness_score, INITIAL_EFFECTIVENESS_SCORE);
        assert!(result.within_thresholds);
        let baseline = h.integrator.baseline().await.unwrap().unwrap();
        assert_eq!(baseline.get(names::CPU_PERCENT), Some(40.0));
    }

    #[tokio::test]
    async fn test_second_cycle_is_deterministic() {
        let h = harness(IntegratorConfig::default());

        h.integrator.run_once().await;
        let second = h.integrator.run_once().await;
        let third = h.integrator.run_once().await;

        assert_eq!(second.effectiveness_score, third.effectiveness_score);
        // No improvement on the baseline, only the compliance bonus
        assert!((second.effectiveness_score - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_low_score_escalates_strategy() {
        let h = harness(IntegratorConfig::default());
        h.integrator.run_once().await;
        h.integrator.run_once().await;

        assert_eq!(
            h.integrator.monitor().optimizer().strategy(),
            OptimizationStrategy::Aggressive
        );
    }

    #[tokio::test]
    async fn test_high_cpu_triggers_cache_optimization() {
        let h = harness(IntegratorConfig::default());
        h.integrator
            .monitor()
            .register_action(OptimizationAction::new(
                "cache_optimization",
                "Warm hot keys",
                5,
                handler_fn(|| async { Ok(ActionOutcome::new()) }),
            ));
        h.source.set(host(99.0, 50.0));

        let result = h.integrator.run_once().await;

        assert!(!result.within_thresholds);
        assert!(result.needs_adjustment);
        assert_eq!(result.actions_triggered.len(), 1);
        assert_eq!(result.actions_triggered[0].action_type, "cache_optimization");

        // Cooling down on the next cycle
        let result = h.integrator.run_once().await;
        assert!(result.actions_triggered.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_yields_failed_result() {
        let h = harness(IntegratorConfig::default());
        h.store.set_available(false);

        let result = h.integrator.run_once().await;

        assert!(result.is_error());
        assert!(!result.within_thresholds);
        assert!(result.needs_adjustment);
        assert!(!h.integrator.store_reachable().await);
    }

    #[tokio::test]
    async fn test_history_newest_first_and_bounded() {
        let h = harness(IntegratorConfig::default());
        for _ in 0..3 {
            h.integrator.run_once().await;
        }

        let history = h.integrator.history(10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].timestamp >= history[2].timestamp);
        assert_eq!(
            h.integrator.latest().await.unwrap().unwrap(),
            history[0]
        );
    }

    #[tokio::test]
    async fn test_reset_baseline() {
        let h = harness(IntegratorConfig::default());
        h.integrator.run_once().await;

        assert!(h.integrator.reset_baseline().await.unwrap());
        let result = h.integrator.run_once().await;
        assert_eq!(result.effectiveness_score, INITIAL_EFFECTIVENESS_SCORE);
    }

    #[tokio::test]
    async fn test_report_written_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(IntegratorConfig {
            report_dir: Some(dir.path().join("reports")),
            ..Default::default()
        });

        h.integrator.run_once().await;

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_unknown_action() {
        let h = harness(IntegratorConfig::default());
        let err = h.integrator.trigger_optimization("defragment").await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(IntegratorConfig {
            interval: Duration::from_millis(10),
            ..Default::default()
        });
        let integrator = Arc::new(h.integrator);
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(Arc::clone(&integrator).run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(!integrator.history(100).await.unwrap().is_empty());
    }
}
