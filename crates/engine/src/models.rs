//! Core data models for the performance engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known metric names used by thresholds, conditions and validation
pub mod names {
    pub const CPU_PERCENT: &str = "cpu_percent";
    pub const MEMORY_PERCENT: &str = "memory_percent";
    pub const MEMORY_MB: &str = "memory_mb";
    pub const DISK_USAGE: &str = "disk_usage";
    pub const NETWORK_IO: &str = "network_io";
    pub const PROCESS_COUNT: &str = "process_count";
    pub const RESPONSE_TIME: &str = "response_time";
    pub const CACHE_HIT_RATE: &str = "cache_hit_rate";
    pub const ERROR_RATE: &str = "error_rate";
    pub const QUEUE_LENGTH: &str = "queue_length";
    pub const DB_CONNECTIONS: &str = "db_connections";
}

/// A single instrumented operation sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub timestamp: DateTime<Utc>,
    pub operation_type: String,
    pub operation_id: String,
    pub duration_ms: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub db_connections: u32,
    pub cache_hit_rate: f64,
    pub queue_length: u32,
    pub error_count: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PerformanceMetric {
    /// Create a sample stamped with the current time and no resource snapshot
    pub fn new(
        operation_type: impl Into<String>,
        operation_id: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation_type: operation_type.into(),
            operation_id: operation_id.into(),
            duration_ms,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            db_connections: 0,
            cache_hit_rate: 0.0,
            queue_length: 0,
            error_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// Attach the resource figures of a system sample
    pub fn with_system(mut self, sample: &SystemSample) -> Self {
        self.cpu_percent = sample.cpu_percent;
        self.memory_mb = sample.memory_mb;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_count > 0
    }
}

/// Host-level resource sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: f64,
    pub disk_usage: f64,
    /// Bytes sent plus bytes received across all interfaces
    pub network_io: u64,
    pub process_count: usize,
}

/// Mean host readings over a run of samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemAverages {
    pub samples: usize,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: f64,
    pub disk_usage: f64,
}

impl SystemAverages {
    /// Averages over `samples`; all zero when there are none
    pub fn from_samples(samples: &[SystemSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = |field: fn(&SystemSample) -> f64| samples.iter().map(field).sum::<f64>() / n;
        Self {
            samples: samples.len(),
            cpu_percent: mean(|s| s.cpu_percent),
            memory_percent: mean(|s| s.memory_percent),
            memory_mb: mean(|s| s.memory_mb),
            disk_usage: mean(|s| s.disk_usage),
        }
    }
}

/// Flat view of the current metric values, keyed by metric name
///
/// This is what thresholds, optimization conditions and the validation
/// loop evaluate against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSnapshot {
    values: HashMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a system sample
    pub fn from_system(sample: &SystemSample) -> Self {
        let mut snapshot = Self::new();
        snapshot.insert(names::CPU_PERCENT, sample.cpu_percent);
        snapshot.insert(names::MEMORY_PERCENT, sample.memory_percent);
        snapshot.insert(names::MEMORY_MB, sample.memory_mb);
        snapshot.insert(names::DISK_USAGE, sample.disk_usage);
        snapshot.insert(names::NETWORK_IO, sample.network_io as f64);
        snapshot.insert(names::PROCESS_COUNT, sample.process_count as f64);
        snapshot
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Merge another snapshot into this one, overwriting shared keys
    pub fn merge(&mut self, other: MetricSnapshot) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }
}

impl FromIterator<(String, f64)> for MetricSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_system() {
        let sample = SystemSample {
            timestamp: Utc::now(),
            cpu_percent: 42.0,
            memory_percent: 63.5,
            memory_mb: 2048.0,
            disk_usage: 71.0,
            network_io: 1_000,
            process_count: 120,
        };

        let snapshot = MetricSnapshot::from_system(&sample);
        assert_eq!(snapshot.get(names::CPU_PERCENT), Some(42.0));
        assert_eq!(snapshot.get(names::PROCESS_COUNT), Some(120.0));
        assert_eq!(snapshot.get(names::RESPONSE_TIME), None);
    }

    #[test]
    fn test_snapshot_merge_overwrites() {
        let mut a = MetricSnapshot::new().with(names::CACHE_HIT_RATE, 0.5);
        let b = MetricSnapshot::new()
            .with(names::CACHE_HIT_RATE, 0.9)
            .with(names::QUEUE_LENGTH, 3.0);

        a.merge(b);
        assert_eq!(a.get(names::CACHE_HIT_RATE), Some(0.9));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snapshot = MetricSnapshot::new().with(names::CPU_PERCENT, 10.0);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cpu_percent"], 10.0);
    }

    #[test]
    fn test_system_averages() {
        let reading = |cpu: f64, memory: f64| SystemSample {
            cpu_percent: cpu,
            memory_percent: memory,
            memory_mb: memory * 10.0,
            disk_usage: 50.0,
            ..Default::default()
        };

        let averages = SystemAverages::from_samples(&[reading(20.0, 40.0), reading(40.0, 60.0)]);
        assert_eq!(averages.samples, 2);
        assert_eq!(averages.cpu_percent, 30.0);
        assert_eq!(averages.memory_percent, 50.0);
        assert_eq!(averages.memory_mb, 500.0);
        assert_eq!(averages.disk_usage, 50.0);

        assert_eq!(SystemAverages::from_samples(&[]), SystemAverages::default());
    }
}
