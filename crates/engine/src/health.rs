//! Component health tracking
//!
//! Backs the control plane's health endpoint with per-component status for
//! the monitor, the optimizer, the validation loop and the result store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working with reduced function
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health with the per-component breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    /// Worst status across components; no components is healthy
    pub fn overall(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Component names for health tracking
pub mod components {
    pub const MONITOR: &str = "monitor";
    pub const OPTIMIZER: &str = "optimizer";
    pub const INTEGRATOR: &str = "optimization_integrator";
    pub const STORE: &str = "store";
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record the outcome of a liveness check for a component
    pub async fn record_check<E: Display>(&self, name: &str, outcome: Result<(), E>) {
        match outcome {
            Ok(()) => self.set_healthy(name).await,
            Err(e) => self.set_unhealthy(name, e.to_string()).await,
        }
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.components.read().await.contains_key(name)
    }

    pub async fn status_of(&self, name: &str) -> Option<ComponentStatus> {
        self.components.read().await.get(name).map(|c| c.status)
    }

    pub async fn report(&self) -> HealthReport {
        let components = self.components.read().await.clone();
        HealthReport {
            status: HealthReport::overall(&components),
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let report = registry.report().await;

        assert_eq!(report.status, ComponentStatus::Healthy);
        assert!(report.components.is_empty());
    }

    #[tokio::test]
    async fn test_register_component() {
        let registry = HealthRegistry::new();
        assert!(!registry.is_registered(components::INTEGRATOR).await);

        registry.register(components::INTEGRATOR).await;

        assert!(registry.is_registered(components::INTEGRATOR).await);
        assert_eq!(
            registry.status_of(components::INTEGRATOR).await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_degraded_component_degrades_overall() {
        let registry = HealthRegistry::new();
        registry.register(components::MONITOR).await;
        registry.register(components::OPTIMIZER).await;

        registry
            .set_degraded(components::MONITOR, "Sampling loop stopped")
            .await;

        assert_eq!(registry.report().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::new();
        registry
            .set_degraded(components::MONITOR, "Sampling loop stopped")
            .await;
        registry
            .record_check(components::STORE, Err("connection refused"))
            .await;

        let report = registry.report().await;
        assert_eq!(report.status, ComponentStatus::Unhealthy);
        assert!(!report.status.is_operational());
        assert_eq!(
            report.components[components::STORE].message.as_deref(),
            Some("connection refused")
        );
    }

    #[tokio::test]
    async fn test_recovered_check_is_healthy() {
        let registry = HealthRegistry::new();
        registry
            .record_check(components::STORE, Err("timeout"))
            .await;
        registry
            .record_check::<&str>(components::STORE, Ok(()))
            .await;

        assert_eq!(registry.report().await.status, ComponentStatus::Healthy);
    }
}
