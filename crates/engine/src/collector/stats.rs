//! Aggregate statistics and trend estimation over operation durations
//!
//! Trend is the least-squares slope of duration against sample index,
//! confidence is the R² of that fit.

use serde::{Deserialize, Serialize};

/// Minimum samples required before a trend is reported
pub const MIN_TREND_SAMPLES: usize = 10;

/// Duration statistics for one operation type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub std_dev: f64,
}

impl OperationStats {
    /// Compute statistics over durations; empty input yields the empty result
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut sorted = durations.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let avg = sorted.iter().sum::<f64>() / n as f64;

        // Sample standard deviation, zero for a single sample
        let std_dev = if n > 1 {
            let var = sorted.iter().map(|d| (d - avg).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Self {
            count: n,
            avg_ms: avg,
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            median_ms: median(&sorted),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
            std_dev,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Linear trend over the ordered durations of one operation type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Slope in milliseconds per sample; positive means getting slower
    pub trend: f64,
    /// Fit quality in [0, 1]
    pub confidence: f64,
    pub samples: usize,
}

impl TrendAnalysis {
    /// Fit a trend line; fewer than [`MIN_TREND_SAMPLES`] yields trend 0, confidence 0
    pub fn from_durations(durations: &[f64]) -> Self {
        let samples = durations.len();
        if samples < MIN_TREND_SAMPLES {
            return Self {
                trend: 0.0,
                confidence: 0.0,
                samples,
            };
        }

        let slope = linear_regression_slope(durations);
        let confidence = r_squared(durations, slope).clamp(0.0, 1.0);

        Self {
            trend: slope,
            confidence,
            samples,
        }
    }

    pub fn is_degrading(&self) -> bool {
        self.trend > 0.0
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Nearest-rank percentile over already sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn linear_regression_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

fn r_squared(values: &[f64], slope: f64) -> f64 {
    let n = values.len() as f64;
    let mean_y = values.iter().sum::<f64>() / n;
    let mean_x = (n - 1.0) / 2.0;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;

    for (i, y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    // Flat series: the line fits exactly but explains nothing
    if ss_tot.abs() < f64::EPSILON {
        return 0.0;
    }

    1.0 - (ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = OperationStats::from_durations(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats, OperationStats::default());
    }

    #[test]
    fn test_basic_stats() {
        let stats = OperationStats::from_durations(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(stats.count, 4);
        assert!((stats.avg_ms - 25.0).abs() < 1e-9);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 40.0);
        assert!((stats.median_ms - 25.0).abs() < 1e-9);
        assert_eq!(stats.p95_ms, 40.0);
        assert!((stats.std_dev - 12.909944487358056).abs() < 1e-9);
    }

    #[test]
    fn test_percentiles_on_hundred_samples() {
        let durations: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let stats = OperationStats::from_durations(&durations);
        assert_eq!(stats.p95_ms, 96.0);
        assert_eq!(stats.p99_ms, 100.0);
        assert!((stats.median_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_has_zero_std_dev() {
        let stats = OperationStats::from_durations(&[5.0]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.median_ms, 5.0);
    }

    #[test]
    fn test_trend_insufficient_samples() {
        let trend = TrendAnalysis::from_durations(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(trend.trend, 0.0);
        assert_eq!(trend.confidence, 0.0);
        assert_eq!(trend.samples, 9);
    }

    #[test]
    fn test_trend_increasing() {
        let durations: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 5.0).collect();
        let trend = TrendAnalysis::from_durations(&durations);
        assert!((trend.trend - 5.0).abs() < 1e-9);
        assert!(trend.confidence > 0.99);
        assert!(trend.is_degrading());
    }

    #[test]
    fn test_trend_flat_series() {
        let durations = vec![50.0; 15];
        let trend = TrendAnalysis::from_durations(&durations);
        assert_eq!(trend.trend, 0.0);
        assert_eq!(trend.confidence, 0.0);
        assert_eq!(trend.samples, 15);
    }

    #[test]
    fn test_trend_noisy_series_has_lower_confidence() {
        let noisy: Vec<f64> = (0..30)
            .map(|i| 100.0 + i as f64 + if i % 2 == 0 { 40.0 } else { -40.0 })
            .collect();
        let trend = TrendAnalysis::from_durations(&noisy);
        assert!(trend.trend > 0.0);
        assert!(trend.confidence < 0.5);
    }
}
