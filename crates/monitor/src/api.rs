//! HTTP control plane
//!
//! Health, status, reports, thresholds, optimization and validation
//! endpoints, plus Prometheus exposition. `/run-validation` and
//! `/optimize/:action_type` are kept as aliases of their `/validation/`
//! counterparts.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use perf_engine::{
    alerting::Threshold,
    collector::hours_ago,
    error::MonitorError,
    health::{components, HealthRegistry},
    monitor::{PerformanceMonitor, DEFAULT_REPORT_WINDOW_MINUTES},
    observability::EngineMetrics,
    optimizer::OptimizationStrategy,
    validation::{OptimizationIntegrator, ValidationResult},
    SystemAverages,
};
use prometheus::{Encoder, TextEncoder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<PerformanceMonitor>,
    pub integrator: Option<Arc<OptimizationIntegrator>>,
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
}

impl AppState {
    pub fn new(
        monitor: Arc<PerformanceMonitor>,
        integrator: Option<Arc<OptimizationIntegrator>>,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            monitor,
            integrator,
            health_registry,
            metrics: EngineMetrics::new(),
        }
    }

    fn integrator(&self) -> Result<&Arc<OptimizationIntegrator>, ApiError> {
        self.integrator
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable("optimization integrator not initialized".to_string()))
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    Engine(MonitorError),
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Engine(e) => {
                let status = match &e {
                    MonitorError::NotFound { .. } => StatusCode::NOT_FOUND,
                    MonitorError::Configuration(_) => StatusCode::BAD_REQUEST,
                    MonitorError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
        };

        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Decode an optional JSON body; an empty body yields the default
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))
}

/// Health check; 503 when the integrator is missing or the store is unreachable
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let integrator_initialized = state.integrator.is_some();

    if let Some(integrator) = &state.integrator {
        let outcome = if integrator.store_reachable().await {
            Ok(())
        } else {
            Err("store unreachable")
        };
        state
            .health_registry
            .record_check(components::STORE, outcome)
            .await;
    }

    let monitoring_active = state.monitor.is_monitoring();
    if monitoring_active {
        state.health_registry.set_healthy(components::MONITOR).await;
    } else {
        state
            .health_registry
            .set_degraded(components::MONITOR, "background monitoring stopped")
            .await;
    }

    let report = state.health_registry.report().await;
    let healthy = integrator_initialized && report.status.is_operational();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "monitoring_active": monitoring_active,
            "optimization_integrator_initialized": integrator_initialized,
            "components": report.components,
        })),
    )
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.status())
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub operation_type: Option<String>,
    pub window_minutes: Option<u64>,
}

async fn report(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let request: ReportRequest = optional_body(&body)?;
    Ok(Json(state.monitor.get_performance_report(
        request.operation_type.as_deref(),
        request
            .window_minutes
            .unwrap_or(DEFAULT_REPORT_WINDOW_MINUTES),
    )))
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub window_minutes: Option<u64>,
}

async fn operation_metrics(
    State(state): State<Arc<AppState>>,
    Path(operation_type): Path<String>,
    Query(query): Query<WindowQuery>,
) -> impl IntoResponse {
    let window_minutes = query.window_minutes.unwrap_or(DEFAULT_REPORT_WINDOW_MINUTES);
    let collector = state.monitor.collector();

    Json(json!({
        "operation_type": operation_type,
        "window_minutes": window_minutes,
        "stats": collector.get_operation_stats(&operation_type, window_minutes),
        "trend": collector.get_trend_analysis(&operation_type, window_minutes),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SamplesQuery {
    pub samples: Option<usize>,
}

/// Fresh host reading plus the recent buffer and its averages
async fn system_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SamplesQuery>,
) -> impl IntoResponse {
    let collector = state.monitor.collector();
    let current = collector.collect_system_metrics().await;
    let samples = collector.recent_system_samples(query.samples.unwrap_or(10));
    let averages = SystemAverages::from_samples(&samples);

    Json(json!({
        "current": current,
        "count": samples.len(),
        "samples": samples,
        "averages": averages,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerRequest {
    #[serde(alias = "action_type")]
    pub optimization_type: Option<String>,
}

/// Start an optimization in the background
///
/// With an action type that action runs; without one, the top
/// opportunities for the current strategy run. A named action that is
/// still executing is rejected with 409.
async fn trigger_optimization(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: TriggerRequest = optional_body(&body)?;
    let monitor = Arc::clone(&state.monitor);

    match request.optimization_type {
        Some(action_type) => {
            if !monitor.optimizer().has_action(&action_type) {
                return Err(MonitorError::not_found("optimization action", action_type).into());
            }
            if monitor.optimizer().is_running(&action_type) {
                return Err(ApiError::Conflict(format!(
                    "optimization action {} is already running",
                    action_type
                )));
            }
            info!(action_type = %action_type, "Optimization triggered via API");
            let scheduled = action_type.clone();
            tokio::spawn(async move {
                if let Err(e) = monitor.optimizer().execute(&scheduled).await {
                    warn!(action_type = %scheduled, error = %e, "Triggered optimization did not run");
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "status": "accepted", "optimization_type": action_type })),
            ))
        }
        None => {
            info!("Automatic optimization triggered via API");
            tokio::spawn(async move {
                let snapshot = monitor.current_snapshot().await;
                monitor.optimizer().auto_optimize(&snapshot).await;
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "status": "accepted", "optimization_type": null })),
            ))
        }
    }
}

async fn opportunities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.monitor.current_snapshot().await;
    let optimizer = state.monitor.optimizer();

    let opportunities: Vec<serde_json::Value> = optimizer
        .evaluate_opportunities(&snapshot)
        .iter()
        .map(|action| {
            json!({
                "action": action.summary(),
                "learning_rate": optimizer.learning_rate(&action.action_type),
            })
        })
        .collect();

    Json(json!({
        "strategy": optimizer.strategy(),
        "opportunities": opportunities,
        "current_metrics": snapshot,
    }))
}

fn strategy_body(monitor: &PerformanceMonitor) -> serde_json::Value {
    let optimizer = monitor.optimizer();
    json!({
        "strategy": optimizer.strategy(),
        "patterns_learned": optimizer.patterns_learned(),
        "learning_rates": optimizer.learning_rates(),
    })
}

async fn get_strategy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(strategy_body(&state.monitor))
}

#[derive(Debug, Deserialize)]
pub struct StrategyRequest {
    pub strategy: String,
}

async fn set_strategy(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StrategyRequest>,
) -> ApiResult<impl IntoResponse> {
    let strategy: OptimizationStrategy = request.strategy.parse()?;
    state
        .monitor
        .optimizer()
        .set_strategy(strategy, "set via API");
    Ok(Json(strategy_body(&state.monitor)))
}

async fn list_thresholds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.thresholds().list())
}

async fn register_threshold(
    State(state): State<Arc<AppState>>,
    Json(threshold): Json<Threshold>,
) -> ApiResult<impl IntoResponse> {
    state.monitor.register_threshold(threshold.clone())?;
    Ok((StatusCode::CREATED, Json(threshold)))
}

async fn delete_threshold(
    State(state): State<Arc<AppState>>,
    Path(metric_name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.monitor.delete_threshold(&metric_name)?;
    Ok(Json(json!({ "deleted": removed })))
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub limit: Option<usize>,
    pub hours: Option<u64>,
}

/// Optimization executions in the window, newest first, with the alerts
/// fired over the same span
async fn alert_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> impl IntoResponse {
    let cutoff = hours_ago(query.hours.unwrap_or(24));
    let limit = query.limit.unwrap_or(100);
    let history: Vec<_> = state
        .monitor
        .optimizer()
        .history(limit)
        .into_iter()
        .filter(|record| record.timestamp >= cutoff)
        .collect();
    let alerts: Vec<_> = state
        .monitor
        .alerts()
        .history(limit)
        .into_iter()
        .filter(|alert| alert.timestamp >= cutoff)
        .collect();

    Json(json!({
        "count": history.len(),
        "history": history,
        "alerts": alerts,
    }))
}

async fn start_monitoring(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = state.monitor.start_monitoring();
    Json(json!({ "monitoring_active": true, "changed": started }))
}

async fn stop_monitoring(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stopped = state.monitor.stop_monitoring().await;
    Json(json!({ "monitoring_active": false, "changed": stopped }))
}

async fn validation_metrics(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let integrator = state.integrator()?;
    let baseline = integrator.baseline().await?;
    let current = state.monitor.current_snapshot().await;

    Ok(Json(json!({
        "current": current,
        "baseline": baseline,
        "limits": integrator.limits(),
    })))
}

async fn run_validation(State(state): State<Arc<AppState>>) -> ApiResult<Json<ValidationResult>> {
    let integrator = state.integrator()?;
    Ok(Json(integrator.run_once().await))
}

async fn validation_optimize(
    State(state): State<Arc<AppState>>,
    Path(action_type): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let integrator = state.integrator()?;
    let record = integrator.trigger_optimization(&action_type).await?;
    Ok(Json(record))
}

async fn validation_status(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let integrator = state.integrator()?;
    let latest = integrator.latest().await?;
    let history = integrator.history(10).await?;

    Ok(Json(json!({
        "latest": latest,
        "recent": history,
        "probes": integrator.probe_names(),
        "strategy": state.monitor.optimizer().strategy(),
    })))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/report", post(report))
        .route("/metrics", get(metrics))
        .route("/metrics/operation/:operation_type", get(operation_metrics))
        .route("/metrics/system", get(system_metrics))
        .route("/optimization/trigger", post(trigger_optimization))
        .route("/optimization/opportunities", get(opportunities))
        .route("/adaptive/strategy", get(get_strategy).put(set_strategy))
        .route("/thresholds", get(list_thresholds).post(register_threshold))
        .route("/thresholds/:metric_name", delete(delete_threshold))
        .route("/alerts/history", get(alert_history))
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
        .route("/validation/metrics", get(validation_metrics))
        .route("/validation/run", post(run_validation))
        .route("/validation/optimize/:action_type", post(validation_optimize))
        .route("/validation/status", get(validation_status))
        .route("/run-validation", post(run_validation))
        .route("/optimize/:action_type", post(validation_optimize))
        .with_state(state)
}

/// Serve the control plane until shutdown is signalled
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
