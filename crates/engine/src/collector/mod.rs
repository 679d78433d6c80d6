//! Metrics collection and aggregation
//!
//! Records per-operation samples and host samples into bounded windows and
//! computes duration statistics and trend estimates over them.

mod stats;
mod system;


pub use stats::{OperationStats, TrendAnalysis, MIN_TREND_SAMPLES};
pub use system::{StaticSource, SysinfoSource, SystemMetricsSource};

use crate::models::{PerformanceMetric, SystemSample};
use crate::observability::EngineMetrics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Default capacity of the global metric list and the host sample buffer
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Per-operation window length that triggers compaction
pub const OPERATION_WINDOW_LIMIT: usize = 1000;

/// Per-operation window length kept after compaction
pub const OPERATION_WINDOW_RETAIN: usize = 500;

/// Start of a window reaching `minutes` back from now
///
/// Windows longer than chrono can represent reach back to the earliest
/// representable instant, so they cover every retained sample.
pub fn minutes_ago(minutes: u64) -> DateTime<Utc> {
    i64::try_from(minutes)
        .ok()
        .and_then(ChronoDuration::try_minutes)
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start of a window reaching `hours` back from now, saturating like [`minutes_ago`]
pub fn hours_ago(hours: u64) -> DateTime<Utc> {
    i64::try_from(hours)
        .ok()
        .and_then(ChronoDuration::try_hours)
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Configuration for the metrics collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum recorded operation samples and host samples kept
    pub max_samples: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

/// Ordered raw durations for one operation type
///
/// Grows to [`OPERATION_WINDOW_LIMIT`], then is compacted to the most recent
/// [`OPERATION_WINDOW_RETAIN`] entries. Once compacted it stays bounded at the
/// retained length, dropping the oldest duration on each write.
#[derive(Debug, Clone, Default)]
pub struct OperationWindow {
    durations: VecDeque<f64>,
    compacted: bool,
}

impl OperationWindow {
    /// Append a duration; returns true when this write compacted the window
    pub fn push(&mut self, duration_ms: f64) -> bool {
        self.durations.push_back(duration_ms);

        let limit = if self.compacted {
            OPERATION_WINDOW_RETAIN
        } else {
            OPERATION_WINDOW_LIMIT
        };
        if self.durations.len() <= limit {
            return false;
        }

        let excess = self.durations.len() - OPERATION_WINDOW_RETAIN;
        self.durations.drain(..excess);
        let first_compaction = !self.compacted;
        self.compacted = true;
        first_compaction
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.durations.iter().copied().collect()
    }
}

/// Bounded in-memory store of operation and host samples
pub struct MetricsCollector {
    config: CollectorConfig,
    /// Every recorded operation sample, oldest first
    metrics: Mutex<VecDeque<PerformanceMetric>>,
    /// Raw durations per operation type
    operation_windows: DashMap<String, OperationWindow>,
    /// Host samples, oldest first
    system_samples: Mutex<VecDeque<SystemSample>>,
    source: Arc<dyn SystemMetricsSource>,
    engine_metrics: EngineMetrics,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MetricsCollector {
    pub fn new(source: Arc<dyn SystemMetricsSource>, config: CollectorConfig) -> Self {
        Self {
            metrics: Mutex::new(VecDeque::with_capacity(config.max_samples.min(10_000))),
            operation_windows: DashMap::new(),
            system_samples: Mutex::new(VecDeque::new()),
            source,
            config,
            engine_metrics: EngineMetrics::new(),
        }
    }

    /// Collector reading the host through `sysinfo`
    pub fn with_sysinfo() -> Self {
        Self::new(Arc::new(SysinfoSource::new()), CollectorConfig::default())
    }

    /// Record an operation sample
    pub fn record_metric(&self, metric: PerformanceMetric) {
        self.engine_metrics.observe_operation(
            &metric.operation_type,
            metric.duration_ms / 1000.0,
            metric.is_error(),
        );

        // The window is updated under the list lock so both keep scope-exit order
        let mut metrics = lock(&self.metrics);

        {
            let mut window = self
                .operation_windows
                .entry(metric.operation_type.clone())
                .or_default();
            if window.push(metric.duration_ms) {
                debug!(
                    operation_type = %metric.operation_type,
                    retained = OPERATION_WINDOW_RETAIN,
                    "Compacted operation window"
                );
            }
        }

        while metrics.len() >= self.config.max_samples {
            metrics.pop_front();
        }
        metrics.push_back(metric);
    }

    /// Read host counters and append the reading to the host sample buffer
    ///
    /// A failed read is logged and yields a default sample that is not stored.
    pub async fn collect_system_metrics(&self) -> SystemSample {
        match self.source.sample().await {
            Ok(sample) => {
                self.push_system_sample(sample.clone());
                self.engine_metrics.inc_system_samples();
                sample
            }
            Err(e) => {
                warn!(error = %e, "Failed to collect system metrics");
                self.engine_metrics.inc_collection_errors();
                SystemSample {
                    timestamp: Utc::now(),
                    ..Default::default()
                }
            }
        }
    }

    fn push_system_sample(&self, sample: SystemSample) {
        let mut samples = lock(&self.system_samples);
        while samples.len() >= self.config.max_samples {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Duration statistics for an operation type within the last `window_minutes`
    pub fn get_operation_stats(&self, operation_type: &str, window_minutes: u64) -> OperationStats {
        OperationStats::from_durations(&self.durations_in_window(operation_type, window_minutes))
    }

    /// Linear trend for an operation type within the last `window_minutes`
    pub fn get_trend_analysis(&self, operation_type: &str, window_minutes: u64) -> TrendAnalysis {
        TrendAnalysis::from_durations(&self.durations_in_window(operation_type, window_minutes))
    }

    /// In-window durations in recording order
    fn durations_in_window(&self, operation_type: &str, window_minutes: u64) -> Vec<f64> {
        let cutoff = minutes_ago(window_minutes);
        lock(&self.metrics)
            .iter()
            .filter(|m| m.operation_type == operation_type && m.timestamp >= cutoff)
            .map(|m| m.duration_ms)
            .collect()
    }

    /// Error ratio across all operations within the window
    pub fn error_rate(&self, window_minutes: u64) -> f64 {
        let cutoff = minutes_ago(window_minutes);
        let metrics = lock(&self.metrics);
        let (total, errors) = metrics
            .iter()
            .filter(|m| m.timestamp >= cutoff)
            .fold((0usize, 0usize), |(t, e), m| {
                (t + 1, e + usize::from(m.is_error()))
            });
        if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        }
    }

    /// Mean duration across all operations within the window
    pub fn mean_response_time(&self, window_minutes: u64) -> Option<f64> {
        let cutoff = minutes_ago(window_minutes);
        let metrics = lock(&self.metrics);
        let (count, sum) = metrics
            .iter()
            .filter(|m| m.timestamp >= cutoff)
            .fold((0usize, 0.0), |(c, s), m| (c + 1, s + m.duration_ms));
        (count > 0).then(|| sum / count as f64)
    }

    /// Operation types that have at least one recorded sample, sorted
    pub fn operation_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .operation_windows
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        types
    }

    /// Snapshot of the raw duration window for an operation type
    pub fn operation_window(&self, operation_type: &str) -> Vec<f64> {
        self.operation_windows
            .get(operation_type)
            .map(|w| w.to_vec())
            .unwrap_or_default()
    }

    /// Number of operation samples currently retained
    pub fn metric_count(&self) -> usize {
        lock(&self.metrics).len()
    }

    /// Most recent host sample, if any
    pub fn latest_system_sample(&self) -> Option<SystemSample> {
        lock(&self.system_samples).back().cloned()
    }

    /// Up to `limit` most recent host samples, oldest first
    pub fn recent_system_samples(&self, limit: usize) -> Vec<SystemSample> {
        let samples = lock(&self.system_samples);
        let skip = samples.len().saturating_sub(limit);
        samples.iter().skip(skip).cloned().collect()
    }

    /// Drop operation samples older than `max_age_minutes` and shrink buffers
    ///
    /// Returns the number of operation samples removed.
    pub fn compact(&self, max_age_minutes: u64) -> usize {
        let cutoff = minutes_ago(max_age_minutes);
        let mut metrics = lock(&self.metrics);
        let before = metrics.len();
        metrics.retain(|m| m.timestamp >= cutoff);
        metrics.shrink_to_fit();
        let removed = before - metrics.len();

        let mut samples = lock(&self.system_samples);
        samples.retain(|s| s.timestamp >= cutoff);
        samples.shrink_to_fit();

        removed
    }
}
