//! Adaptive performance monitoring and optimization engine
//!
//! This crate provides the core functionality for:
//! - Operation and host metrics collection with bounded windows
//! - Threshold alerting with consecutive-violation counters
//! - Adaptive optimization with cooldowns and learning rates
//! - Periodic validation against a persisted baseline
//! - Health checks and observability

pub mod alerting;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod optimizer;
pub mod validation;

pub use alerting::{Alert, AlertCallback, AlertSeverity, Threshold};
pub use collector::{MetricsCollector, OperationStats, TrendAnalysis};
pub use error::{MonitorError, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthReport};
pub use models::*;
pub use monitor::{OperationScope, PerformanceMonitor, ServiceMetricsSource};
pub use observability::{EngineMetrics, StructuredLogger};
pub use optimizer::{AdaptiveOptimizer, OptimizationAction, OptimizationStrategy};
pub use validation::{OptimizationIntegrator, ValidationResult};
