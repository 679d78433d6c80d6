//! Performance monitor
//!
//! Composition root for the collector, the threshold registry, alert
//! dispatch and the adaptive optimizer. Instrumented code reports through
//! [`PerformanceMonitor::monitor_operation`] or an [`OperationScope`].

mod report;
mod sampler;
mod scope;


pub use report::{MonitorStatus, OperationReport, PerformanceReport};
pub use scope::OperationScope;

use crate::alerting::{Alert, AlertCallback, AlertDispatcher, Threshold, ThresholdRegistry};
use crate::collector::MetricsCollector;
use crate::error::Result;
use crate::models::{names, MetricSnapshot};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::optimizer::{ActionExecutionRecord, AdaptiveOptimizer, OptimizationAction};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default report window
pub const DEFAULT_REPORT_WINDOW_MINUTES: u64 = 60;

/// Window used for response time and error rate in current snapshots
const SNAPSHOT_WINDOW_MINUTES: u64 = 5;

/// Executions included in a performance report
const REPORT_HISTORY_LIMIT: usize = 50;

/// Source of application-level metrics such as cache hit rate or queue length
#[async_trait]
pub trait ServiceMetricsSource: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(&self) -> anyhow::Result<MetricSnapshot>;
}

/// Configuration for the performance monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Background sampling period
    pub sample_interval: Duration,
    /// Run automatic optimization after each background sample
    pub auto_optimize: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(30),
            auto_optimize: true,
        }
    }
}

/// Result of one sampling pass
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub snapshot: MetricSnapshot,
    pub alerts: Vec<Alert>,
    pub actions: Vec<ActionExecutionRecord>,
}

struct MonitoringTask {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct PerformanceMonitor {
    collector: Arc<MetricsCollector>,
    thresholds: ThresholdRegistry,
    alerts: AlertDispatcher,
    optimizer: Arc<AdaptiveOptimizer>,
    service_sources: RwLock<Vec<Arc<dyn ServiceMetricsSource>>>,
    config: MonitorConfig,
    logger: StructuredLogger,
    metrics: EngineMetrics,
    monitoring: Mutex<Option<MonitoringTask>>,
}

impl PerformanceMonitor {
    pub fn new(
        collector: Arc<MetricsCollector>,
        optimizer: Arc<AdaptiveOptimizer>,
        logger: StructuredLogger,
        config: MonitorConfig,
    ) -> Self {
        Self {
            collector,
            thresholds: ThresholdRegistry::new(),
            alerts: AlertDispatcher::new(),
            optimizer,
            service_sources: RwLock::new(Vec::new()),
            config,
            logger,
            metrics: EngineMetrics::new(),
            monitoring: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn optimizer(&self) -> &Arc<AdaptiveOptimizer> {
        &self.optimizer
    }

    pub fn thresholds(&self) -> &ThresholdRegistry {
        &self.thresholds
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Open a scope that records one sample when it ends
    pub fn begin_operation(
        &self,
        operation_type: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> OperationScope {
        OperationScope::begin(Arc::clone(&self.collector), operation_type, operation_id)
    }

    /// Time `work` and record exactly one sample for it
    ///
    /// The work's error is returned unchanged after being recorded.
    pub async fn monitor_operation<F, T, E>(
        &self,
        operation_type: &str,
        operation_id: &str,
        work: F,
    ) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let scope = self.begin_operation(operation_type, operation_id);
        match work.await {
            Ok(value) => {
                scope.complete();
                Ok(value)
            }
            Err(e) => {
                scope.fail(&e);
                Err(e)
            }
        }
    }

    pub fn register_threshold(&self, threshold: Threshold) -> Result<()> {
        info!(
            metric = %threshold.metric_name,
            warning = threshold.warning_threshold,
            critical = threshold.critical_threshold,
            "Registering threshold"
        );
        self.thresholds.register(threshold)
    }

    pub fn delete_threshold(&self, metric_name: &str) -> Result<Threshold> {
        self.thresholds.delete(metric_name)
    }

    pub fn register_alert_callback(&self, callback: Arc<dyn AlertCallback>) {
        self.alerts.register(callback);
    }

    pub fn register_action(&self, action: OptimizationAction) {
        self.optimizer.register_action(action);
    }

    pub fn register_service_source(&self, source: Arc<dyn ServiceMetricsSource>) {
        info!(source = %source.name(), "Registering service metrics source");
        self.service_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
    }

    /// Evaluate thresholds against a snapshot and dispatch the alerts that fire
    pub async fn check_thresholds(&self, snapshot: &MetricSnapshot) -> Vec<Alert> {
        let fired = self.thresholds.evaluate(snapshot);
        self.alerts.dispatch(fired.clone()).await;
        fired
    }

    /// Fresh host reading plus recent operation figures and service metrics
    ///
    /// A failing service source is logged and skipped.
    pub async fn current_snapshot(&self) -> MetricSnapshot {
        let sample = self.collector.collect_system_metrics().await;
        let mut snapshot = MetricSnapshot::from_system(&sample);

        if let Some(response_time) = self.collector.mean_response_time(SNAPSHOT_WINDOW_MINUTES) {
            snapshot.insert(names::RESPONSE_TIME, response_time);
        }
        snapshot.insert(
            names::ERROR_RATE,
            self.collector.error_rate(SNAPSHOT_WINDOW_MINUTES),
        );

        let sources: Vec<Arc<dyn ServiceMetricsSource>> = self
            .service_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for source in sources {
            match source.collect().await {
                Ok(values) => snapshot.merge(values),
                Err(e) => warn!(source = %source.name(), error = %e, "Service metrics source failed"),
            }
        }

        snapshot
    }

    /// One monitoring pass: sample, check thresholds, optionally optimize
    pub async fn sample_once(&self) -> SampleOutcome {
        let snapshot = self.current_snapshot().await;
        let alerts = self.check_thresholds(&snapshot).await;
        let actions = if self.config.auto_optimize {
            self.optimizer.auto_optimize(&snapshot).await
        } else {
            Vec::new()
        };

        SampleOutcome {
            snapshot,
            alerts,
            actions,
        }
    }

    /// Statistics and trend for one or every operation type
    pub fn get_performance_report(
        &self,
        operation_type: Option<&str>,
        window_minutes: u64,
    ) -> PerformanceReport {
        let types = match operation_type {
            Some(op) => vec![op.to_string()],
            None => self.collector.operation_types(),
        };

        let operations = types
            .into_iter()
            .map(|op| {
                let report = OperationReport {
                    stats: self.collector.get_operation_stats(&op, window_minutes),
                    trend: self.collector.get_trend_analysis(&op, window_minutes),
                };
                (op, report)
            })
            .collect();

        PerformanceReport {
            generated_at: Utc::now(),
            window_minutes,
            operations,
            optimization_history: self.optimizer.history(REPORT_HISTORY_LIMIT),
            system_metrics: self.collector.latest_system_sample(),
            strategy: self.optimizer.strategy(),
            patterns_learned: self.optimizer.patterns_learned(),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            monitoring_active: self.is_monitoring(),
            adaptive_engine_initialized: true,
            services_integrated: self
                .service_sources
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            total_metrics: self.collector.metric_count(),
            operation_types: self.collector.operation_types(),
            threshold_count: self.thresholds.len(),
            optimization_actions: self.optimizer.action_count(),
            alert_callbacks: self.alerts.callback_count(),
            current_strategy: self.optimizer.strategy(),
            patterns_learned: self.optimizer.patterns_learned(),
            learning_rates: self.optimizer.learning_rates().into_iter().collect(),
            current_system_metrics: self.collector.latest_system_sample(),
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start the background sampling task
    ///
    /// Returns false when monitoring is already running.
    pub fn start_monitoring(self: &Arc<Self>) -> bool {
        let mut monitoring = self.monitoring.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = monitoring.as_ref() {
            if !task.handle.is_finished() {
                return false;
            }
        }

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampler::run(
            Arc::downgrade(self),
            self.config.sample_interval,
            shutdown_rx,
        ));
        *monitoring = Some(MonitoringTask { shutdown, handle });

        self.metrics.set_monitoring_active(true);
        info!(
            interval_secs = self.config.sample_interval.as_secs(),
            "Performance monitoring started"
        );
        true
    }

    /// Stop the background sampling task and wait for it to exit
    ///
    /// Returns false when monitoring was not running.
    pub async fn stop_monitoring(&self) -> bool {
        let task = self
            .monitoring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return false;
        };

        let _ = task.shutdown.send(());
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Sampling task ended abnormally");
        }

        self.metrics.set_monitoring_active(false);
        info!("Performance monitoring stopped");
        true
    }
}
