//! Report and status views of the monitor

use crate::collector::{OperationStats, TrendAnalysis};
use crate::models::SystemSample;
use crate::optimizer::{ActionExecutionRecord, OptimizationStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics and trend for one operation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub stats: OperationStats,
    pub trend: TrendAnalysis,
}

/// Aggregated performance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub window_minutes: u64,
    pub operations: BTreeMap<String, OperationReport>,
    /// Most recent action executions, newest first
    pub optimization_history: Vec<ActionExecutionRecord>,
    pub system_metrics: Option<SystemSample>,
    pub strategy: OptimizationStrategy,
    pub patterns_learned: usize,
}

/// Point-in-time monitor status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub monitoring_active: bool,
    pub adaptive_engine_initialized: bool,
    /// Registered service metric sources
    pub services_integrated: usize,
    pub total_metrics: usize,
    pub operation_types: Vec<String>,
    pub threshold_count: usize,
    pub optimization_actions: usize,
    pub alert_callbacks: usize,
    pub current_strategy: OptimizationStrategy,
    pub patterns_learned: usize,
    pub learning_rates: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_system_metrics: Option<SystemSample>,
}
