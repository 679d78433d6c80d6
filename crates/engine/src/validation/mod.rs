//! Validation of optimization effectiveness
//!
//! This module provides:
//! - A key-value store abstraction for baselines and results
//! - Limit checks and effectiveness scoring against a baseline
//! - Regression probes over collector statistics
//! - The periodic validation loop that ties them together

mod effectiveness;
mod integrator;
mod regression;
mod store;

pub use effectiveness::{
    effectiveness_score, LimitViolation, ThresholdValidation, ValidationLimits, ViolationSeverity,
};
pub use integrator::{
    IntegratorConfig, OptimizationIntegrator, OptimizationStatus, ValidationResult,
    INITIAL_EFFECTIVENESS_SCORE,
};
pub use regression::{default_probes, LatencyProbe, ProbeResult, RegressionProbe, RegressionReport};
pub use store::{keys, InMemoryStore, KeyValueStore};
