//! Alert dispatch to registered callbacks

use super::Alert;
use crate::observability::{EngineMetrics, StructuredLogger};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::warn;

/// Maximum fired alerts retained in history
const ALERT_HISTORY_LIMIT: usize = 1000;

/// Receiver of confirmed threshold alerts
#[async_trait]
pub trait AlertCallback: Send + Sync {
    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> AlertCallback for F
where
    F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync,
{
    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        (self)(alert)
    }
}

/// Wrap a plain closure as an alert callback
pub fn alert_callback<F>(f: F) -> Arc<dyn AlertCallback>
where
    F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Callback that only emits a structured log line
pub struct LoggingAlertCallback {
    logger: StructuredLogger,
}

impl LoggingAlertCallback {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl AlertCallback for LoggingAlertCallback {
    async fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        self.logger.log_alert(
            &alert.metric_name,
            alert.current,
            alert.threshold,
            &alert.severity.to_string(),
        );
        Ok(())
    }
}

/// Fans alerts out to callbacks and keeps a bounded history
pub struct AlertDispatcher {
    callbacks: RwLock<Vec<Arc<dyn AlertCallback>>>,
    history: Mutex<VecDeque<Alert>>,
    metrics: EngineMetrics,
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            metrics: EngineMetrics::new(),
        }
    }

    pub fn register(&self, callback: Arc<dyn AlertCallback>) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver each alert to every callback exactly once
    ///
    /// A failing callback is logged and does not stop delivery to the others.
    pub async fn dispatch(&self, alerts: Vec<Alert>) {
        if alerts.is_empty() {
            return;
        }

        let callbacks: Vec<Arc<dyn AlertCallback>> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for alert in alerts {
            self.metrics
                .inc_alerts_fired(&alert.metric_name, &alert.severity.to_string());
            self.remember(alert.clone());

            for callback in &callbacks {
                if let Err(e) = callback.on_alert(&alert).await {
                    warn!(
                        metric = %alert.metric_name,
                        error = %e,
                        "Alert callback failed"
                    );
                }
            }
        }
    }

    fn remember(&self, alert: Alert) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= ALERT_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(alert);
    }

    /// Most recent alerts, newest first
    pub fn history(&self, limit: usize) -> Vec<Alert> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertSeverity;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alert(metric: &str) -> Alert {
        Alert {
            metric_name: metric.to_string(),
            current: 90.0,
            threshold: 80.0,
            severity: AlertSeverity::Warning,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_every_callback_invoked_once() {
        let dispatcher = AlertDispatcher::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&first);
        dispatcher.register(alert_callback(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let c2 = Arc::clone(&second);
        dispatcher.register(alert_callback(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        dispatcher.dispatch(vec![alert("cpu_percent")]).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_abort() {
        let dispatcher = AlertDispatcher::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        dispatcher.register(alert_callback(|_| anyhow::bail!("webhook unreachable")));
        let counter = Arc::clone(&delivered);
        dispatcher.register(alert_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        dispatcher
            .dispatch(vec![alert("cpu_percent"), alert("memory_percent")])
            .await;

        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.history(10).len(), 2);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let dispatcher = AlertDispatcher::new();
        dispatcher.dispatch(vec![alert("a"), alert("b")]).await;

        let history = dispatcher.history(1);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].metric_name, "b");
    }
}
