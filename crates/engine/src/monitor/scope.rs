//! Scoped operation timing

use crate::collector::MetricsCollector;
use crate::models::PerformanceMetric;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

/// Records exactly one sample for a monitored operation
///
/// Finish with [`OperationScope::complete`] or [`OperationScope::fail`].
/// A scope dropped before either call is recorded as an error, which covers
/// cancelled futures and early returns.
pub struct OperationScope {
    collector: Arc<MetricsCollector>,
    operation_type: String,
    operation_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    metadata: HashMap<String, String>,
    finished: bool,
}

impl OperationScope {
    pub(crate) fn begin(
        collector: Arc<MetricsCollector>,
        operation_type: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            operation_type: operation_type.into(),
            operation_id: operation_id.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            metadata: HashMap::new(),
            finished: false,
        }
    }

    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }

    /// Attach a metadata entry to the recorded sample
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn complete(mut self) {
        self.finish(None);
    }

    pub fn fail(mut self, error: impl Display) {
        self.finish(Some(error.to_string()));
    }

    fn finish(&mut self, error: Option<String>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut metric = PerformanceMetric::new(
            self.operation_type.clone(),
            self.operation_id.clone(),
            duration_ms,
        );
        if let Some(sample) = self.collector.latest_system_sample() {
            metric = metric.with_system(&sample);
        }
        metric.metadata = std::mem::take(&mut self.metadata);
        metric
            .metadata
            .insert("started_at".to_string(), self.started_at.to_rfc3339());
        if let Some(error) = error {
            metric.error_count = 1;
            metric.metadata.insert("error".to_string(), error);
        }

        self.collector.record_metric(metric);
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Some("operation scope dropped before completion".to_string()));
        }
    }
}
