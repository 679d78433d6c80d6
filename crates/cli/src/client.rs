//! API client for the perf-monitor control plane

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the perf-monitor control plane
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        send(self.client.post(url).json(body)).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        send(self.client.put(url).json(body)).await
    }

    /// Make a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        send(self.client.delete(url)).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await.context("Failed to send request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, message);
    }

    response.json().await.context("Failed to parse response")
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// API response types

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: f64,
    pub disk_usage: f64,
    #[serde(default)]
    pub network_io: u64,
    #[serde(default)]
    pub process_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub monitoring_active: bool,
    #[serde(default)]
    pub adaptive_engine_initialized: bool,
    #[serde(default)]
    pub services_integrated: usize,
    pub total_metrics: usize,
    pub operation_types: Vec<String>,
    pub threshold_count: usize,
    pub optimization_actions: usize,
    pub alert_callbacks: usize,
    pub current_strategy: String,
    pub patterns_learned: usize,
    #[serde(default)]
    pub learning_rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub current_system_metrics: Option<SystemSample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub trend: f64,
    pub confidence: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    pub stats: OperationStats,
    pub trend: TrendAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExecutionRecord {
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub window_minutes: u64,
    pub operations: BTreeMap<String, OperationReport>,
    #[serde(default)]
    pub optimization_history: Vec<ActionExecutionRecord>,
    pub system_metrics: Option<SystemSample>,
    pub strategy: String,
    pub patterns_learned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    pub window_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    pub metric_name: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub window_minutes: u64,
    pub consecutive_violations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedThreshold {
    pub deleted: Threshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub strategy: String,
    pub patterns_learned: usize,
    #[serde(default)]
    pub learning_rates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub optimization_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    pub action_type: String,
    pub description: String,
    pub priority: i32,
    pub cooldown_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub action: ActionSummary,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunities {
    pub strategy: String,
    pub opportunities: Vec<Opportunity>,
    pub current_metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub metric_name: String,
    pub current: f64,
    pub threshold: f64,
    pub severity: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub count: usize,
    #[serde(default)]
    pub history: Vec<ActionExecutionRecord>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitViolation {
    pub metric: String,
    pub current: f64,
    pub limit: f64,
    pub severity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdValidation {
    pub passed: bool,
    #[serde(default)]
    pub checked: Vec<String>,
    #[serde(default)]
    pub violations: Vec<LimitViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionReport {
    pub passed: bool,
    #[serde(default)]
    pub probes: Vec<ProbeResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub system_metrics: BTreeMap<String, f64>,
    pub threshold_validation: ThresholdValidation,
    pub effectiveness_score: f64,
    pub regression_results: RegressionReport,
    pub within_thresholds: bool,
    pub needs_adjustment: bool,
    #[serde(default)]
    pub actions_triggered: Vec<ActionExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub latest: Option<ValidationResult>,
    #[serde(default)]
    pub recent: Vec<ValidationResult>,
    #[serde(default)]
    pub probes: Vec<String>,
    pub strategy: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "monitoring_active": true,
                    "adaptive_engine_initialized": true,
                    "services_integrated": 2,
                    "total_metrics": 12,
                    "operation_types": ["conversion"],
                    "threshold_count": 3,
                    "optimization_actions": 3,
                    "alert_callbacks": 1,
                    "current_strategy": "balanced",
                    "patterns_learned": 1,
                    "learning_rates": { "memory_cleanup": 0.011 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status: MonitorStatus = client.get("status").await.unwrap();

        mock.assert_async().await;
        assert!(status.monitoring_active);
        assert!(status.adaptive_engine_initialized);
        assert_eq!(status.services_integrated, 2);
        assert_eq!(status.total_metrics, 12);
        assert_eq!(status.current_strategy, "balanced");
        assert!(status.current_system_metrics.is_none());
        assert_eq!(status.learning_rates["memory_cleanup"], 0.011);
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/thresholds/queue_length")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"threshold not found: queue_length"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .delete::<DeletedThreshold>("thresholds/queue_length")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("threshold not found: queue_length"));
    }

    #[tokio::test]
    async fn test_put_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/adaptive/strategy")
            .match_body(mockito::Matcher::Json(json!({ "strategy": "aggressive" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"strategy":"aggressive","patterns_learned":0,"learning_rates":{}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let info: StrategyInfo = client
            .put(
                "adaptive/strategy",
                &StrategyRequest {
                    strategy: "aggressive".to_string(),
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(info.strategy, "aggressive");
    }

    #[tokio::test]
    async fn test_trigger_accepted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/optimization/trigger")
            .match_body(mockito::Matcher::Json(
                json!({ "optimization_type": "memory_cleanup" }),
            ))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"accepted","optimization_type":"memory_cleanup"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response: TriggerResponse = client
            .post(
                "optimization/trigger",
                &TriggerRequest {
                    optimization_type: Some("memory_cleanup".to_string()),
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, "accepted");
        assert_eq!(response.optimization_type.as_deref(), Some("memory_cleanup"));
    }

    #[tokio::test]
    async fn test_alert_history_reads_executions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/alerts/history?limit=5&hours=2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "count": 1,
                    "history": [{
                        "action_type": "memory_cleanup",
                        "timestamp": "2026-10-19T08:00:00Z",
                        "success": true,
                        "duration_ms": 4.5
                    }],
                    "alerts": []
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let history: AlertHistory = client.get("alerts/history?limit=5&hours=2").await.unwrap();

        assert_eq!(history.count, 1);
        assert_eq!(history.history[0].action_type, "memory_cleanup");
        assert!(history.alerts.is_empty());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
