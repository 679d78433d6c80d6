//! Threshold configuration and consecutive-violation tracking

use super::{Alert, AlertSeverity};
use crate::error::{MonitorError, Result};
use crate::models::MetricSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn default_window_minutes() -> u64 {
    5
}

fn default_consecutive_violations() -> u32 {
    3
}

/// Alerting threshold for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric_name: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    /// Consecutive violating samples required before an alert fires
    #[serde(default = "default_consecutive_violations")]
    pub consecutive_violations: u32,
}

impl Threshold {
    pub fn new(metric_name: impl Into<String>, warning: f64, critical: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            warning_threshold: warning,
            critical_threshold: critical,
            window_minutes: default_window_minutes(),
            consecutive_violations: default_consecutive_violations(),
        }
    }

    pub fn with_consecutive_violations(mut self, count: u32) -> Self {
        self.consecutive_violations = count;
        self
    }

    pub fn with_window_minutes(mut self, minutes: u64) -> Self {
        self.window_minutes = minutes;
        self
    }

    /// Reject thresholds that could never fire or fire inconsistently
    pub fn validate(&self) -> Result<()> {
        if self.metric_name.trim().is_empty() {
            return Err(MonitorError::Configuration(
                "metric_name must not be empty".to_string(),
            ));
        }
        if !self.warning_threshold.is_finite() || !self.critical_threshold.is_finite() {
            return Err(MonitorError::Configuration(format!(
                "thresholds for {} must be finite",
                self.metric_name
            )));
        }
        if self.critical_threshold < self.warning_threshold {
            return Err(MonitorError::Configuration(format!(
                "critical threshold for {} is below its warning threshold",
                self.metric_name
            )));
        }
        if self.consecutive_violations == 0 {
            return Err(MonitorError::Configuration(format!(
                "consecutive_violations for {} must be at least 1",
                self.metric_name
            )));
        }
        Ok(())
    }

    fn severity_for(&self, value: f64) -> AlertSeverity {
        if value > self.critical_threshold {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        }
    }
}

#[derive(Debug)]
struct ThresholdEntry {
    threshold: Threshold,
    /// Consecutive samples above the warning threshold
    violations: u32,
}

/// Registry of thresholds keyed by metric name
#[derive(Debug, Default)]
pub struct ThresholdRegistry {
    entries: Mutex<HashMap<String, ThresholdEntry>>,
}

impl ThresholdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ThresholdEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the threshold for its metric, resetting its counter
    pub fn register(&self, threshold: Threshold) -> Result<()> {
        threshold.validate()?;
        self.entries().insert(
            threshold.metric_name.clone(),
            ThresholdEntry {
                threshold,
                violations: 0,
            },
        );
        Ok(())
    }

    /// Remove the threshold for a metric
    pub fn delete(&self, metric_name: &str) -> Result<Threshold> {
        self.entries()
            .remove(metric_name)
            .map(|entry| entry.threshold)
            .ok_or_else(|| MonitorError::not_found("threshold", metric_name))
    }

    pub fn get(&self, metric_name: &str) -> Option<Threshold> {
        self.entries()
            .get(metric_name)
            .map(|entry| entry.threshold.clone())
    }

    /// All thresholds sorted by metric name
    pub fn list(&self) -> Vec<Threshold> {
        let mut thresholds: Vec<Threshold> = self
            .entries()
            .values()
            .map(|entry| entry.threshold.clone())
            .collect();
        thresholds.sort_by(|a, b| a.metric_name.cmp(&b.metric_name));
        thresholds
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Current consecutive-violation count for a metric
    pub fn violation_count(&self, metric_name: &str) -> Option<u32> {
        self.entries().get(metric_name).map(|entry| entry.violations)
    }

    /// Update violation counters from a snapshot and return the alerts that fired
    ///
    /// An alert fires on the sample where the counter reaches the required
    /// count. A sustained breach does not fire again until a compliant sample
    /// resets the counter. Metrics absent from the snapshot leave their
    /// counter untouched.
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<Alert> {
        let mut fired = Vec::new();
        let mut entries = self.entries();

        for entry in entries.values_mut() {
            let Some(value) = snapshot.get(&entry.threshold.metric_name) else {
                continue;
            };

            if value > entry.threshold.warning_threshold {
                entry.violations = entry.violations.saturating_add(1);
                if entry.violations == entry.threshold.consecutive_violations {
                    fired.push(Alert {
                        metric_name: entry.threshold.metric_name.clone(),
                        current: value,
                        threshold: entry.threshold.warning_threshold,
                        severity: entry.threshold.severity_for(value),
                        timestamp: Utc::now(),
                    });
                }
            } else {
                entry.violations = 0;
            }
        }

        fired.sort_by(|a, b| a.metric_name.cmp(&b.metric_name));
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_threshold() -> Threshold {
        Threshold::new("cpu", 80.0, 95.0).with_consecutive_violations(3)
    }

    fn feed(registry: &ThresholdRegistry, values: &[f64]) -> Vec<Alert> {
        values
            .iter()
            .flat_map(|v| registry.evaluate(&MetricSnapshot::new().with("cpu", *v)))
            .collect()
    }

    #[test]
    fn test_three_consecutive_violations_fire_once() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        let alerts = feed(&registry, &[85.0, 85.0, 85.0]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric_name, "cpu");
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].threshold, 80.0);
    }

    #[test]
    fn test_compliant_sample_resets_counter() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        assert!(feed(&registry, &[85.0, 85.0, 50.0]).is_empty());
        assert_eq!(registry.violation_count("cpu"), Some(0));
    }

    #[test]
    fn test_sustained_breach_fires_once_per_breach() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        assert_eq!(feed(&registry, &[85.0; 10]).len(), 1);
        assert_eq!(feed(&registry, &[50.0, 90.0, 90.0, 90.0]).len(), 1);
    }

    #[test]
    fn test_critical_severity() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        let alerts = feed(&registry, &[85.0, 90.0, 97.0]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].current, 97.0);
    }

    #[test]
    fn test_register_is_upsert() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();
        feed(&registry, &[85.0, 85.0]);

        registry
            .register(Threshold::new("cpu", 70.0, 90.0).with_consecutive_violations(1))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("cpu").unwrap().warning_threshold, 70.0);
        assert_eq!(registry.violation_count("cpu"), Some(0));
    }

    #[test]
    fn test_delete_unknown_threshold() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        let err = registry.delete("memory").unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { .. }));
        assert_eq!(registry.list(), vec![cpu_threshold()]);
    }

    #[test]
    fn test_delete_existing_threshold() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();

        assert_eq!(registry.delete("cpu").unwrap(), cpu_threshold());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_metric_leaves_counter() {
        let registry = ThresholdRegistry::new();
        registry.register(cpu_threshold()).unwrap();
        feed(&registry, &[85.0, 85.0]);

        registry.evaluate(&MetricSnapshot::new().with("memory", 10.0));
        assert_eq!(registry.violation_count("cpu"), Some(2));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let registry = ThresholdRegistry::new();
        let inverted = Threshold::new("cpu", 95.0, 80.0);
        assert!(matches!(
            registry.register(inverted),
            Err(MonitorError::Configuration(_))
        ));

        let never = Threshold::new("cpu", 80.0, 95.0).with_consecutive_violations(0);
        assert!(registry.register(never).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_threshold_deserialize_defaults() {
        let threshold: Threshold = serde_json::from_str(
            r#"{"metric_name":"response_time","warning_threshold":1000,"critical_threshold":3000}"#,
        )
        .unwrap();
        assert_eq!(threshold.consecutive_violations, 3);
        assert_eq!(threshold.window_minutes, 5);
    }
}
