//! Optimization action definitions

use crate::models::MetricSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result payload reported by an optimization handler
pub type ActionOutcome = serde_json::Map<String, serde_json::Value>;

/// Predicate deciding whether an action applies to the current metrics
pub type Condition = Arc<dyn Fn(&MetricSnapshot) -> bool + Send + Sync>;

/// Capability that performs a corrective action
///
/// Handlers run to completion or error; they have no cancellation contract.
#[async_trait]
pub trait OptimizationHandler: Send + Sync {
    async fn execute(&self) -> anyhow::Result<ActionOutcome>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> OptimizationHandler for FnHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionOutcome>> + Send,
{
    async fn execute(&self) -> anyhow::Result<ActionOutcome> {
        (self.0)().await
    }
}

/// Wrap an async closure as an optimization handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn OptimizationHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A registered corrective action
#[derive(Clone)]
pub struct OptimizationAction {
    pub action_type: String,
    pub description: String,
    /// Higher runs first
    pub priority: i32,
    pub condition: Condition,
    pub handler: Arc<dyn OptimizationHandler>,
    /// Minimum time between two executions of this action
    pub cooldown: Duration,
}

impl OptimizationAction {
    /// Action that always applies and has a five minute cooldown
    pub fn new(
        action_type: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        handler: Arc<dyn OptimizationHandler>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            description: description.into(),
            priority,
            condition: Arc::new(|_| true),
            handler,
            cooldown: Duration::from_secs(5 * 60),
        }
    }

    pub fn with_condition<C>(mut self, condition: C) -> Self
    where
        C: Fn(&MetricSnapshot) -> bool + Send + Sync + 'static,
    {
        self.condition = Arc::new(condition);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_cooldown_minutes(self, minutes: u64) -> Self {
        self.with_cooldown(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn applies_to(&self, snapshot: &MetricSnapshot) -> bool {
        (self.condition)(snapshot)
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            action_type: self.action_type.clone(),
            description: self.description.clone(),
            priority: self.priority,
            cooldown_minutes: self.cooldown.as_secs_f64() / 60.0,
        }
    }
}

impl fmt::Debug for OptimizationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationAction")
            .field("action_type", &self.action_type)
            .field("priority", &self.priority)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

/// Serializable view of a registered action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub action_type: String,
    pub description: String,
    pub priority: i32,
    pub cooldown_minutes: f64,
}

/// Outcome of one action execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionRecord {
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionExecutionRecord {
    /// Improvement magnitude reported by the handler, if any
    pub fn improvement(&self) -> Option<f64> {
        self.result
            .as_ref()
            .and_then(|r| r.get("improvement"))
            .and_then(|v| v.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::names;

    #[tokio::test]
    async fn test_handler_fn_executes_closure() {
        let handler = handler_fn(|| async {
            let mut outcome = ActionOutcome::new();
            outcome.insert("evicted".to_string(), 12.into());
            Ok(outcome)
        });

        let outcome = handler.execute().await.unwrap();
        assert_eq!(outcome["evicted"], 12);
    }

    #[test]
    fn test_condition_evaluated_against_snapshot() {
        let action = OptimizationAction::new(
            "memory_cleanup",
            "Release cached buffers",
            5,
            handler_fn(|| async { Ok(ActionOutcome::new()) }),
        )
        .with_condition(|m| m.get(names::MEMORY_PERCENT).unwrap_or(0.0) > 80.0);

        assert!(action.applies_to(&MetricSnapshot::new().with(names::MEMORY_PERCENT, 91.0)));
        assert!(!action.applies_to(&MetricSnapshot::new().with(names::MEMORY_PERCENT, 40.0)));
        assert!(!action.applies_to(&MetricSnapshot::new()));
    }

    #[test]
    fn test_record_improvement() {
        let mut result = ActionOutcome::new();
        result.insert("improvement".to_string(), serde_json::json!(0.25));
        let record = ActionExecutionRecord {
            action_type: "cache_optimization".to_string(),
            timestamp: Utc::now(),
            success: true,
            duration_ms: 3.0,
            result: Some(result),
            error: None,
        };
        assert_eq!(record.improvement(), Some(0.25));
    }

    #[test]
    fn test_summary_reports_cooldown_minutes() {
        let action = OptimizationAction::new(
            "db_optimization",
            "Resize connection pool",
            3,
            handler_fn(|| async { Ok(ActionOutcome::new()) }),
        )
        .with_cooldown_minutes(10);
        assert_eq!(action.summary().cooldown_minutes, 10.0);
    }
}
