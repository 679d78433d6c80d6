//! Limit checks and effectiveness scoring against a baseline

use crate::models::{names, MetricSnapshot};
use serde::{Deserialize, Serialize};

/// Fraction beyond a limit at which a violation becomes high severity
const HIGH_SEVERITY_MARGIN: f64 = 0.2;

/// Added to the score when every limit holds
const COMPLIANCE_BONUS: f64 = 0.1;

/// Operating limits checked on every validation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub response_time_ms: f64,
    /// Minimum acceptable cache hit rate
    pub cache_hit_rate_min: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            response_time_ms: 2000.0,
            cache_hit_rate_min: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitViolation {
    pub metric: String,
    pub current: f64,
    pub limit: f64,
    pub severity: ViolationSeverity,
}

/// Outcome of checking a snapshot against [`ValidationLimits`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdValidation {
    pub passed: bool,
    /// Metrics that were present in the snapshot and checked
    pub checked: Vec<String>,
    pub violations: Vec<LimitViolation>,
}

impl ThresholdValidation {
    pub fn high_severity(&self) -> impl Iterator<Item = &LimitViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::High)
    }
}

impl ValidationLimits {
    /// Check every limited metric present in the snapshot
    pub fn check(&self, snapshot: &MetricSnapshot) -> ThresholdValidation {
        let mut validation = ThresholdValidation::default();

        let ceilings = [
            (names::CPU_PERCENT, self.cpu_percent),
            (names::MEMORY_PERCENT, self.memory_percent),
            (names::RESPONSE_TIME, self.response_time_ms),
        ];
        for (metric, limit) in ceilings {
            let Some(current) = snapshot.get(metric) else {
                continue;
            };
            validation.checked.push(metric.to_string());
            if current > limit {
                let severity = if current > limit * (1.0 + HIGH_SEVERITY_MARGIN) {
                    ViolationSeverity::High
                } else {
                    ViolationSeverity::Medium
                };
                validation.violations.push(LimitViolation {
                    metric: metric.to_string(),
                    current,
                    limit,
                    severity,
                });
            }
        }

        if let Some(current) = snapshot.get(names::CACHE_HIT_RATE) {
            validation.checked.push(names::CACHE_HIT_RATE.to_string());
            let floor = self.cache_hit_rate_min;
            if current < floor {
                let severity = if current < floor * (1.0 - HIGH_SEVERITY_MARGIN) {
                    ViolationSeverity::High
                } else {
                    ViolationSeverity::Medium
                };
                validation.violations.push(LimitViolation {
                    metric: names::CACHE_HIT_RATE.to_string(),
                    current,
                    limit: floor,
                    severity,
                });
            }
        }

        validation.passed = validation.violations.is_empty();
        validation
    }
}

/// Score how far current metrics improved on the baseline, in [0, 1]
///
/// Lower-is-better metrics contribute `(baseline - current) / baseline`
/// floored at zero; cache hit rate contributes the share of the remaining
/// headroom that was gained. The mean of the available ratios gets a bonus
/// when all limits hold.
pub fn effectiveness_score(
    baseline: &MetricSnapshot,
    current: &MetricSnapshot,
    thresholds_passed: bool,
) -> f64 {
    let mut ratios = Vec::with_capacity(4);

    for metric in [names::CPU_PERCENT, names::MEMORY_PERCENT, names::RESPONSE_TIME] {
        if let (Some(base), Some(now)) = (baseline.get(metric), current.get(metric)) {
            if base > 0.0 {
                ratios.push(((base - now) / base).max(0.0));
            }
        }
    }

    if let (Some(base), Some(now)) = (
        baseline.get(names::CACHE_HIT_RATE),
        current.get(names::CACHE_HIT_RATE),
    ) {
        if base < 1.0 {
            ratios.push(((now - base) / (1.0 - base)).clamp(0.0, 1.0));
        }
    }

    let mean = if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };

    let bonus = if thresholds_passed { COMPLIANCE_BONUS } else { 0.0 };
    (mean + bonus).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_limits() {
        let snapshot = MetricSnapshot::new()
            .with(names::CPU_PERCENT, 40.0)
            .with(names::MEMORY_PERCENT, 60.0)
            .with(names::CACHE_HIT_RATE, 0.9);

        let validation = ValidationLimits::default().check(&snapshot);
        assert!(validation.passed);
        assert_eq!(validation.checked.len(), 3);
    }

    #[test]
    fn test_severity_split_at_twenty_percent() {
        let snapshot = MetricSnapshot::new()
            .with(names::CPU_PERCENT, 90.0)
            .with(names::MEMORY_PERCENT, 99.0)
            .with(names::RESPONSE_TIME, 2500.0);

        let validation = ValidationLimits::default().check(&snapshot);
        assert!(!validation.passed);

        let severity = |metric: &str| {
            validation
                .violations
                .iter()
                .find(|v| v.metric == metric)
                .map(|v| v.severity)
        };
        // 90 is 12.5% over 80
        assert_eq!(severity(names::CPU_PERCENT), Some(ViolationSeverity::Medium));
        // 99 is 16.5% over 85
        assert_eq!(severity(names::MEMORY_PERCENT), Some(ViolationSeverity::Medium));
        // 2500 is 25% over 2000
        assert_eq!(severity(names::RESPONSE_TIME), Some(ViolationSeverity::High));
        assert_eq!(validation.high_severity().count(), 1);
    }

    #[test]
    fn test_low_cache_hit_rate() {
        let validation =
            ValidationLimits::default().check(&MetricSnapshot::new().with(names::CACHE_HIT_RATE, 0.5));
        assert_eq!(validation.violations.len(), 1);
        assert_eq!(validation.violations[0].severity, ViolationSeverity::High);
    }

    #[test]
    fn test_score_of_identical_metrics() {
        let snapshot = MetricSnapshot::new()
            .with(names::CPU_PERCENT, 50.0)
            .with(names::CACHE_HIT_RATE, 0.8);

        assert_eq!(effectiveness_score(&snapshot, &snapshot, false), 0.0);
        assert!((effectiveness_score(&snapshot, &snapshot, true) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_score_rewards_improvement() {
        let baseline = MetricSnapshot::new()
            .with(names::CPU_PERCENT, 80.0)
            .with(names::RESPONSE_TIME, 1000.0)
            .with(names::CACHE_HIT_RATE, 0.6);
        let current = MetricSnapshot::new()
            .with(names::CPU_PERCENT, 40.0)
            .with(names::RESPONSE_TIME, 1500.0)
            .with(names::CACHE_HIT_RATE, 0.8);

        // cpu 0.5, response time regressed so 0.0, cache 0.5
        let score = effectiveness_score(&baseline, &current, false);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_capped() {
        let baseline = MetricSnapshot::new().with(names::CPU_PERCENT, 90.0);
        let current = MetricSnapshot::new().with(names::CPU_PERCENT, 0.0);
        assert_eq!(effectiveness_score(&baseline, &current, true), 1.0);
    }
}
