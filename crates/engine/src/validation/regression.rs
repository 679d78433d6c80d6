//! Regression probes run on every validation cycle

use crate::collector::MetricsCollector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Window the default latency probes look back over
const PROBE_WINDOW_MINUTES: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Results of the full probe battery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub passed: bool,
    pub probes: Vec<ProbeResult>,
}

impl RegressionReport {
    pub fn from_results(probes: Vec<ProbeResult>) -> Self {
        Self {
            passed: probes.iter().all(|p| p.passed),
            probes,
        }
    }
}

/// A named check that current behavior has not regressed
#[async_trait]
pub trait RegressionProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, collector: &MetricsCollector) -> ProbeResult;
}

/// Checks the p95 latency of one operation type against a budget
///
/// An operation with no samples in the window passes.
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    name: String,
    operation_type: String,
    budget_ms: f64,
}

impl LatencyProbe {
    pub fn new(name: impl Into<String>, operation_type: impl Into<String>, budget_ms: f64) -> Self {
        Self {
            name: name.into(),
            operation_type: operation_type.into(),
            budget_ms,
        }
    }
}

#[async_trait]
impl RegressionProbe for LatencyProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, collector: &MetricsCollector) -> ProbeResult {
        let stats = collector.get_operation_stats(&self.operation_type, PROBE_WINDOW_MINUTES);
        if stats.is_empty() {
            return ProbeResult {
                name: self.name.clone(),
                passed: true,
                detail: format!("no {} samples", self.operation_type),
            };
        }

        ProbeResult {
            name: self.name.clone(),
            passed: stats.p95_ms <= self.budget_ms,
            detail: format!(
                "p95 {:.1}ms over {} samples, budget {:.0}ms",
                stats.p95_ms, stats.count, self.budget_ms
            ),
        }
    }
}

/// Latency probes for conversion, cache, database and API operations
pub fn default_probes() -> Vec<Arc<dyn RegressionProbe>> {
    vec![
        Arc::new(LatencyProbe::new("conversion_latency", "conversion", 5000.0)),
        Arc::new(LatencyProbe::new("cache_latency", "cache_access", 50.0)),
        Arc::new(LatencyProbe::new("database_latency", "database_query", 200.0)),
        Arc::new(LatencyProbe::new("api_latency", "api_request", 1000.0)),
    ]
}
