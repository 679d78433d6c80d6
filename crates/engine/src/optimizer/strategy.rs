//! Optimization strategy levels

use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How readily optimization actions are triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStrategy {
    #[default]
    Conservative,
    Balanced,
    Aggressive,
    /// Picks its action budget from how well actions have been performing
    Adaptive,
}

impl OptimizationStrategy {
    /// Ordering used for escalation; adaptive sits with balanced
    pub fn level(&self) -> u8 {
        match self {
            OptimizationStrategy::Conservative => 0,
            OptimizationStrategy::Balanced | OptimizationStrategy::Adaptive => 1,
            OptimizationStrategy::Aggressive => 2,
        }
    }

    /// Numeric id exported as a gauge
    pub fn gauge_value(&self) -> i64 {
        match self {
            OptimizationStrategy::Conservative => 0,
            OptimizationStrategy::Balanced => 1,
            OptimizationStrategy::Aggressive => 2,
            OptimizationStrategy::Adaptive => 3,
        }
    }

    /// Maximum actions executed per automatic optimization pass
    pub fn max_actions(&self, mean_learning_rate: f64) -> usize {
        match self {
            OptimizationStrategy::Conservative => 1,
            OptimizationStrategy::Balanced => 2,
            OptimizationStrategy::Aggressive => 3,
            OptimizationStrategy::Adaptive => {
                if mean_learning_rate > super::DEFAULT_LEARNING_RATE * 2.0 {
                    3
                } else {
                    2
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::Conservative => "conservative",
            OptimizationStrategy::Balanced => "balanced",
            OptimizationStrategy::Aggressive => "aggressive",
            OptimizationStrategy::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(OptimizationStrategy::Conservative),
            "balanced" => Ok(OptimizationStrategy::Balanced),
            "aggressive" => Ok(OptimizationStrategy::Aggressive),
            "adaptive" => Ok(OptimizationStrategy::Adaptive),
            other => Err(MonitorError::Configuration(format!(
                "unknown optimization strategy: {other}"
            ))),
        }
    }
}
