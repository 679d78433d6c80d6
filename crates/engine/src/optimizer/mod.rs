//! Adaptive optimization
//!
//! Registered actions pair a condition over current metrics with an async
//! handler. The optimizer selects applicable actions outside their cooldown,
//! runs them, records outcomes and tunes a per-action learning rate that
//! breaks priority ties.

mod action;
mod engine;
mod strategy;

pub use action::{
    handler_fn, ActionExecutionRecord, ActionOutcome, ActionSummary, Condition,
    OptimizationAction, OptimizationHandler,
};
pub use engine::AdaptiveOptimizer;
pub use strategy::OptimizationStrategy;

/// Learning rate assigned to actions that have never executed
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const MIN_LEARNING_RATE: f64 = 0.001;
pub const MAX_LEARNING_RATE: f64 = 0.1;

const LEARNING_RATE_SUCCESS_STEP: f64 = 0.001;
const LEARNING_RATE_FAILURE_STEP: f64 = 0.001;

/// Execution records retained in history
pub const EXECUTION_HISTORY_LIMIT: usize = 1000;
