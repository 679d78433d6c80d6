//! Action registry, cooldown-gated execution and learning-rate adaptation

use super::action::{ActionExecutionRecord, ActionOutcome, ActionSummary, OptimizationAction};
use super::strategy::OptimizationStrategy;
use super::{
    DEFAULT_LEARNING_RATE, EXECUTION_HISTORY_LIMIT, LEARNING_RATE_FAILURE_STEP,
    LEARNING_RATE_SUCCESS_STEP, MAX_LEARNING_RATE, MIN_LEARNING_RATE,
};
use crate::error::{MonitorError, Result};
use crate::models::MetricSnapshot;
use crate::observability::{EngineMetrics, StructuredLogger};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::debug;

/// Registry of optimization actions with per-action learning rates
pub struct AdaptiveOptimizer {
    actions: RwLock<HashMap<String, OptimizationAction>>,
    history: Mutex<VecDeque<ActionExecutionRecord>>,
    learning_rates: DashMap<String, f64>,
    last_executed: DashMap<String, Instant>,
    /// Actions whose handler is currently awaited, keyed to their start
    running: DashMap<String, Instant>,
    strategy: RwLock<OptimizationStrategy>,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl AdaptiveOptimizer {
    pub fn new(logger: StructuredLogger) -> Self {
        let metrics = EngineMetrics::new();
        let strategy = OptimizationStrategy::default();
        metrics.set_strategy_level(strategy.gauge_value());

        Self {
            actions: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            learning_rates: DashMap::new(),
            last_executed: DashMap::new(),
            running: DashMap::new(),
            strategy: RwLock::new(strategy),
            logger,
            metrics,
        }
    }

    /// Insert or replace an action by its type
    pub fn register_action(&self, action: OptimizationAction) {
        debug!(action_type = %action.action_type, priority = action.priority, "Registering optimization action");
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action.action_type.clone(), action);
    }

    pub fn has_action(&self, action_type: &str) -> bool {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(action_type)
    }

    pub fn action_count(&self) -> usize {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Registered actions, highest priority first
    pub fn actions(&self) -> Vec<ActionSummary> {
        let mut summaries: Vec<ActionSummary> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(OptimizationAction::summary)
            .collect();
        summaries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.action_type.cmp(&b.action_type))
        });
        summaries
    }

    fn in_cooldown(&self, action: &OptimizationAction) -> bool {
        if self.running.contains_key(&action.action_type) {
            return true;
        }
        self.last_executed
            .get(&action.action_type)
            .map(|last| last.elapsed() < action.cooldown)
            .unwrap_or(false)
    }

    /// Whether a registered action executed more recently than its cooldown
    pub fn is_cooling_down(&self, action_type: &str) -> bool {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action_type)
            .map(|action| self.in_cooldown(action))
            .unwrap_or(false)
    }

    /// Whether a handler for this action is in flight
    pub fn is_running(&self, action_type: &str) -> bool {
        self.running.contains_key(action_type)
    }

    /// Applicable actions outside their cooldown
    ///
    /// Sorted by descending priority; ties go to the higher learning rate.
    pub fn evaluate_opportunities(&self, current: &MetricSnapshot) -> Vec<OptimizationAction> {
        let candidates: Vec<OptimizationAction> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut ranked: Vec<(OptimizationAction, f64)> = candidates
            .into_iter()
            .filter(|action| !self.in_cooldown(action) && action.applies_to(current))
            .map(|action| {
                let rate = self.learning_rate(&action.action_type);
                (action, rate)
            })
            .collect();

        ranked.sort_by(|(a, rate_a), (b, rate_b)| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| rate_b.total_cmp(rate_a))
                .then_with(|| a.action_type.cmp(&b.action_type))
        });

        ranked.into_iter().map(|(action, _)| action).collect()
    }

    /// Run one action's handler and record the outcome
    ///
    /// Handler failures are captured in the returned record. Only an
    /// unknown action type is an error.
    pub async fn execute(&self, action_type: &str) -> Result<ActionExecutionRecord> {
        let action = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action_type)
            .cloned()
            .ok_or_else(|| MonitorError::not_found("optimization action", action_type))?;

        let started = Instant::now();
        let outcome = {
            let _in_flight = InFlight::enter(&self.running, &action.action_type, started);
            action.handler.execute().await
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.last_executed
            .insert(action.action_type.clone(), Instant::now());

        let record = match outcome {
            Ok(result) => ActionExecutionRecord {
                action_type: action.action_type.clone(),
                timestamp: Utc::now(),
                success: true,
                duration_ms,
                result: Some(result),
                error: None,
            },
            Err(e) => ActionExecutionRecord {
                action_type: action.action_type.clone(),
                timestamp: Utc::now(),
                success: false,
                duration_ms,
                result: None,
                error: Some(format!("{e:#}")),
            },
        };

        self.metrics
            .inc_actions_executed(&record.action_type, record.success);
        self.logger.log_action_executed(
            &record.action_type,
            record.success,
            record.duration_ms,
            record.error.as_deref(),
        );
        self.update_learning(&record.action_type, record.success, record.result.as_ref());
        self.remember(record.clone());

        Ok(record)
    }

    fn remember(&self, record: ActionExecutionRecord) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= EXECUTION_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Adjust an action's learning rate from one execution outcome
    ///
    /// Successes move the rate up by the reported improvement scaled by
    /// 0.01, or by a fixed step when no positive improvement is reported.
    /// Failures move it down by a fixed step. Returns the new rate.
    pub fn update_learning(
        &self,
        action_type: &str,
        success: bool,
        result: Option<&ActionOutcome>,
    ) -> f64 {
        let mut rate = self
            .learning_rates
            .entry(action_type.to_string())
            .or_insert(DEFAULT_LEARNING_RATE);

        let updated = if success {
            let step = result
                .and_then(|r| r.get("improvement"))
                .and_then(|v| v.as_f64())
                .filter(|improvement| improvement.is_finite() && *improvement > 0.0)
                .map(|improvement| improvement * 0.01)
                .unwrap_or(LEARNING_RATE_SUCCESS_STEP);
            (*rate + step).min(MAX_LEARNING_RATE)
        } else {
            (*rate - LEARNING_RATE_FAILURE_STEP).max(MIN_LEARNING_RATE)
        };

        *rate = updated;
        updated
    }

    pub fn learning_rate(&self, action_type: &str) -> f64 {
        self.learning_rates
            .get(action_type)
            .map(|rate| *rate)
            .unwrap_or(DEFAULT_LEARNING_RATE)
    }

    /// Learning rates of every action that has executed at least once
    pub fn learning_rates(&self) -> HashMap<String, f64> {
        self.learning_rates
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Mean learning rate over registered actions
    pub fn mean_learning_rate(&self) -> f64 {
        let action_types: Vec<String> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        if action_types.is_empty() {
            return DEFAULT_LEARNING_RATE;
        }
        let total: f64 = action_types.iter().map(|a| self.learning_rate(a)).sum();
        total / action_types.len() as f64
    }

    /// Number of actions whose learning rate has moved off the default
    pub fn patterns_learned(&self) -> usize {
        self.learning_rates
            .iter()
            .filter(|entry| (*entry.value() - DEFAULT_LEARNING_RATE).abs() > f64::EPSILON)
            .count()
    }

    /// Most recent execution records, newest first
    pub fn history(&self, limit: usize) -> Vec<ActionExecutionRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn execution_count(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn strategy(&self) -> OptimizationStrategy {
        *self.strategy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current strategy, returning the previous one
    pub fn set_strategy(&self, strategy: OptimizationStrategy, reason: &str) -> OptimizationStrategy {
        let previous = {
            let mut current = self.strategy.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, strategy)
        };

        if previous != strategy {
            self.logger
                .log_strategy_change(previous.as_str(), strategy.as_str(), reason);
        }
        self.metrics.set_strategy_level(strategy.gauge_value());
        previous
    }

    /// Move to a more aggressive strategy; never de-escalates
    ///
    /// Returns true when the strategy changed.
    pub fn escalate(&self, target: OptimizationStrategy, reason: &str) -> bool {
        let previous = {
            let mut current = self.strategy.write().unwrap_or_else(PoisonError::into_inner);
            if target.level() <= current.level() {
                return false;
            }
            std::mem::replace(&mut *current, target)
        };

        self.logger
            .log_strategy_change(previous.as_str(), target.as_str(), reason);
        self.metrics.set_strategy_level(target.gauge_value());
        true
    }

    /// Execute the top opportunities the current strategy allows
    pub async fn auto_optimize(&self, current: &MetricSnapshot) -> Vec<ActionExecutionRecord> {
        let budget = self.strategy().max_actions(self.mean_learning_rate());
        let opportunities = self.evaluate_opportunities(current);

        let mut records = Vec::new();
        for action in opportunities.into_iter().take(budget) {
            match self.execute(&action.action_type).await {
                Ok(record) => records.push(record),
                // Removed between evaluation and execution
                Err(e) => debug!(action_type = %action.action_type, error = %e, "Skipping action"),
            }
        }
        records
    }
}

/// Marks an action as running until dropped, including on cancellation
struct InFlight<'a> {
    running: &'a DashMap<String, Instant>,
    action_type: String,
}

impl<'a> InFlight<'a> {
    fn enter(running: &'a DashMap<String, Instant>, action_type: &str, started: Instant) -> Self {
        running.insert(action_type.to_string(), started);
        Self {
            running,
            action_type: action_type.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.action_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::names;
    use crate::optimizer::action::handler_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn optimizer() -> AdaptiveOptimizer {
        AdaptiveOptimizer::new(StructuredLogger::new("test-node"))
    }

    fn noop(action_type: &str, priority: i32) -> OptimizationAction {
        OptimizationAction::new(
            action_type,
            format!("{action_type} action"),
            priority,
            handler_fn(|| async { Ok(ActionOutcome::new()) }),
        )
    }

    fn failing(action_type: &str) -> OptimizationAction {
        OptimizationAction::new(
            action_type,
            "always fails",
            1,
            handler_fn(|| async { Err(anyhow::anyhow!("pool resize rejected")) }),
        )
    }

    #[test]
    fn test_register_is_upsert() {
        let optimizer = optimizer();
        optimizer.register_action(noop("cache_optimization", 1));
        optimizer.register_action(noop("cache_optimization", 9));

        assert_eq!(optimizer.action_count(), 1);
        assert!(optimizer.has_action("cache_optimization"));
        assert_eq!(optimizer.actions()[0].priority, 9);
    }

    #[test]
    fn test_opportunities_sorted_by_priority() {
        let optimizer = optimizer();
        optimizer.register_action(noop("low", 1));
        optimizer.register_action(noop("high", 10));
        optimizer.register_action(noop("mid", 5));

        let order: Vec<String> = optimizer
            .evaluate_opportunities(&MetricSnapshot::new())
            .into_iter()
            .map(|a| a.action_type)
            .collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_priority_tie_broken_by_learning_rate() {
        let optimizer = optimizer();
        optimizer.register_action(noop("a_cache", 5));
        optimizer.register_action(noop("b_pool", 5));
        optimizer.update_learning("b_pool", true, None);

        let opportunities = optimizer.evaluate_opportunities(&MetricSnapshot::new());
        assert_eq!(opportunities[0].action_type, "b_pool");
    }

    #[test]
    fn test_condition_filters_opportunities() {
        let optimizer = optimizer();
        optimizer.register_action(
            noop("memory_cleanup", 5)
                .with_condition(|m| m.get(names::MEMORY_PERCENT).unwrap_or(0.0) > 85.0),
        );

        let calm = MetricSnapshot::new().with(names::MEMORY_PERCENT, 40.0);
        let pressured = MetricSnapshot::new().with(names::MEMORY_PERCENT, 92.0);
        assert!(optimizer.evaluate_opportunities(&calm).is_empty());
        assert_eq!(optimizer.evaluate_opportunities(&pressured).len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_hides_then_restores_action() {
        let optimizer = optimizer();
        optimizer
            .register_action(noop("cache_optimization", 1).with_cooldown(Duration::from_millis(50)));

        optimizer.execute("cache_optimization").await.unwrap();
        assert!(optimizer.is_cooling_down("cache_optimization"));
        assert!(optimizer
            .evaluate_opportunities(&MetricSnapshot::new())
            .is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            optimizer.evaluate_opportunities(&MetricSnapshot::new()).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_execute_records_success() {
        let optimizer = optimizer();
        optimizer.register_action(OptimizationAction::new(
            "cache_optimization",
            "Evict cold entries",
            3,
            handler_fn(|| async {
                let mut outcome = ActionOutcome::new();
                outcome.insert("improvement".to_string(), serde_json::json!(0.5));
                Ok(outcome)
            }),
        ));

        let record = optimizer.execute("cache_optimization").await.unwrap();
        assert!(record.success);
        assert!(record.error.is_none());
        assert!(record.duration_ms >= 0.0);
        assert_eq!(optimizer.history(10).len(), 1);
        assert!((optimizer.learning_rate("cache_optimization") - 0.015).abs() < 1e-9);
        assert_eq!(optimizer.patterns_learned(), 1);
    }

    #[tokio::test]
    async fn test_execute_captures_failure_as_data() {
        let optimizer = optimizer();
        optimizer.register_action(failing("db_optimization"));

        let record = optimizer.execute("db_optimization").await.unwrap();
        assert!(!record.success);
        assert!(record.result.is_none());
        assert!(record
            .error
            .as_deref()
            .unwrap()
            .contains("pool resize rejected"));
        assert!((optimizer.learning_rate("db_optimization") - 0.009).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_execute_unknown_action() {
        let optimizer = optimizer();
        let err = optimizer.execute("defragment").await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { .. }));
        assert_eq!(optimizer.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let optimizer = optimizer();
        optimizer.register_action(noop("memory_cleanup", 1).with_cooldown(Duration::ZERO));

        for _ in 0..(EXECUTION_HISTORY_LIMIT + 5) {
            optimizer.execute("memory_cleanup").await.unwrap();
        }
        assert_eq!(optimizer.execution_count(), EXECUTION_HISTORY_LIMIT);
    }

    #[test]
    fn test_learning_rate_rises_strictly_to_cap() {
        let optimizer = optimizer();
        let mut previous = optimizer.learning_rate("cache_optimization");
        loop {
            let rate = optimizer.update_learning("cache_optimization", true, None);
            assert!(rate <= MAX_LEARNING_RATE);
            if previous >= MAX_LEARNING_RATE {
                assert_eq!(rate, MAX_LEARNING_RATE);
                break;
            }
            assert!(rate > previous);
            previous = rate;
        }
    }

    #[test]
    fn test_learning_rate_falls_strictly_to_floor() {
        let optimizer = optimizer();
        let mut previous = optimizer.learning_rate("db_optimization");
        loop {
            let rate = optimizer.update_learning("db_optimization", false, None);
            assert!(rate >= MIN_LEARNING_RATE);
            if previous <= MIN_LEARNING_RATE {
                assert_eq!(rate, MIN_LEARNING_RATE);
                break;
            }
            assert!(rate < previous);
            previous = rate;
        }
    }

    #[test]
    fn test_non_positive_improvement_uses_fixed_step() {
        let optimizer = optimizer();
        let mut result = ActionOutcome::new();
        result.insert("improvement".to_string(), serde_json::json!(-2.0));

        let rate = optimizer.update_learning("cache_optimization", true, Some(&result));
        assert!((rate - (DEFAULT_LEARNING_RATE + LEARNING_RATE_SUCCESS_STEP)).abs() < 1e-12);
    }

    #[test]
    fn test_escalation_only_moves_up() {
        let optimizer = optimizer();
        assert!(optimizer.escalate(OptimizationStrategy::Aggressive, "low effectiveness"));
        assert!(!optimizer.escalate(OptimizationStrategy::Balanced, "moderate effectiveness"));
        assert_eq!(optimizer.strategy(), OptimizationStrategy::Aggressive);

        let previous = optimizer.set_strategy(OptimizationStrategy::Conservative, "operator");
        assert_eq!(previous, OptimizationStrategy::Aggressive);
        assert_eq!(optimizer.strategy(), OptimizationStrategy::Conservative);
    }

    #[tokio::test]
    async fn test_auto_optimize_respects_strategy_budget() {
        let optimizer = optimizer();
        let runs = Arc::new(AtomicUsize::new(0));
        for (name, priority) in [("a", 3), ("b", 2), ("c", 1)] {
            let counter = Arc::clone(&runs);
            optimizer.register_action(OptimizationAction::new(
                name,
                "counting action",
                priority,
                handler_fn(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(ActionOutcome::new())
                    }
                }),
            ));
        }

        let records = optimizer.auto_optimize(&MetricSnapshot::new()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action_type, "a");

        optimizer.set_strategy(OptimizationStrategy::Aggressive, "test");
        let records = optimizer.auto_optimize(&MetricSnapshot::new()).await;
        // "a" is cooling down
        assert_eq!(records.len(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_running_action_is_not_restarted() {
        let optimizer = Arc::new(optimizer());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        optimizer.register_action(
            OptimizationAction::new(
                "slow_vacuum",
                "slow handler",
                5,
                handler_fn(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(ActionOutcome::new())
                    }
                }),
            )
            .with_cooldown_minutes(10),
        );

        let first = {
            let optimizer = Arc::clone(&optimizer);
            tokio::spawn(async move { optimizer.auto_optimize(&MetricSnapshot::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(optimizer.is_running("slow_vacuum"));
        assert!(optimizer.is_cooling_down("slow_vacuum"));
        let second = optimizer.auto_optimize(&MetricSnapshot::new()).await;
        assert!(second.is_empty());

        assert_eq!(first.await.unwrap().len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!optimizer.is_running("slow_vacuum"));
        assert!(optimizer.is_cooling_down("slow_vacuum"));
    }
}
