//! Key-value persistence for baselines and validation results

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Persisted keys and their retention
pub mod keys {
    use std::time::Duration;

    pub const BASELINE: &str = "baseline_optimization_metrics";
    pub const LATEST_RESULT: &str = "latest_validation_result";
    pub const HISTORY: &str = "validation_history";

    pub const BASELINE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const LATEST_RESULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const HISTORY_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    /// Validation results kept under [`HISTORY`]
    pub const HISTORY_LIMIT: usize = 100;
}

/// JSON key-value store with per-key expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    /// Remove a key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

struct StoredValue {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-local store; expired entries are dropped lazily on access
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle reachability, making every operation fail while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MonitorError::Store("in-memory store unavailable".to_string()))
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.ensure_available()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(Some(stored.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.ensure_available()?;
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_available()?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStore::new();
        store
            .set(keys::BASELINE, json!({"cpu_percent": 40.0}), keys::BASELINE_TTL)
            .await
            .unwrap();

        let value = store.get(keys::BASELINE).await.unwrap().unwrap();
        assert_eq!(value["cpu_percent"], 40.0);

        assert!(store.delete(keys::BASELINE).await.unwrap());
        assert!(!store.delete(keys::BASELINE).await.unwrap());
        assert!(store.get(keys::BASELINE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let store = InMemoryStore::new();
        store
            .set("short_lived", json!(1), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("short_lived").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryStore::new();
        store.set_available(false);

        assert!(matches!(store.ping().await, Err(MonitorError::Store(_))));
        assert!(store.get(keys::HISTORY).await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
