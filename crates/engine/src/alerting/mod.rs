//! Threshold alerting
//!
//! This module provides:
//! - Threshold configuration with consecutive-violation counters
//! - Alert callbacks dispatched when a threshold breach is confirmed
//! - A bounded history of fired alerts

mod dispatcher;
mod threshold;

pub use dispatcher::{alert_callback, AlertCallback, AlertDispatcher, LoggingAlertCallback};
pub use threshold::{Threshold, ThresholdRegistry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A confirmed threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub metric_name: String,
    pub current: f64,
    /// Warning threshold that was breached
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
}
