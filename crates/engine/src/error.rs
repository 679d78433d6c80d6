//! Error taxonomy for the performance engine
//!
//! Only configuration and lookup failures surface to callers. Action
//! failures, collection failures and validation cycle failures are logged
//! and captured as data instead of propagating.

use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors surfaced by the engine's public operations
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A threshold, action or other named entry does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Invalid configuration value (unknown strategy, malformed threshold)
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The backing key-value store failed or is unreachable
    #[error("store error: {0}")]
    Store(String),

    /// Host counters could not be read
    #[error("metric collection failed: {0}")]
    Collection(String),

    /// An uncaught failure inside a validation cycle
    #[error("validation cycle failed: {0}")]
    ValidationCycle(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MonitorError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        MonitorError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns true for errors caused by caller input rather than engine state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MonitorError::NotFound { .. } | MonitorError::Configuration(_)
        )
    }
}
