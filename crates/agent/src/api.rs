//! HTTP API for analytics, health checks and Prometheus metrics

use analytics_lib::{
    health::{ComponentStatus, HealthRegistry},
    AnalyticsEngine, AnomalyRecord, MetricSample, PredictionRecord,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalyticsEngine>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(engine: Arc<AnalyticsEngine>, health_registry: HealthRegistry) -> Self {
        Self {
            engine,
            health_registry,
        }
    }
}

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

/// Health sample submitted by a poller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRequest {
    pub service_name: String,
    pub status: String,
    pub availability_score: f64,
    pub performance_score: f64,
    #[serde(default)]
    pub response_time: Option<f64>,
    /// Defaults to the time of receipt
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SampleRequest {
    fn into_sample(self) -> Result<MetricSample, ApiError> {
        if self.service_name.trim().is_empty() {
            return Err(ApiError::BadRequest("service_name must not be empty".into()));
        }
        let scores = [
            ("availability_score", Some(self.availability_score)),
            ("performance_score", Some(self.performance_score)),
            ("response_time", self.response_time),
        ];
        for (field, value) in scores {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ApiError::BadRequest(format!("{field} must be a finite number")));
            }
        }

        let mut sample = MetricSample::new(
            self.service_name,
            self.status,
            self.availability_score,
            self.performance_score,
        );
        if let Some(ts) = self.timestamp {
            sample = sample.at(ts);
        }
        if let Some(rt) = self.response_time {
            sample = sample.with_response_time(rt);
        }
        Ok(sample)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SampleResponse {
    pub recorded: bool,
    pub anomalies: Vec<AnomalyRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PredictionParams {
    pub horizon_hours: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub service_name: String,
    pub horizon_hours: u32,
    pub predictions: Vec<PredictionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub window_hours: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub service_name: String,
    pub invalidated: bool,
}

/// Run a synchronous engine call on the blocking pool
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AnalyticsEngine) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || f(engine.as_ref()))
        .await
        .map_err(|e| {
            error!(error = %e, "Analytics task failed");
            ApiError::Internal("analytics task failed".into())
        })
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health();

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness();

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return ApiError::Internal(e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Record a sample and run anomaly detection on it
///
/// POST /api/v1/samples
async fn record_sample(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SampleRequest>,
) -> Result<Json<SampleResponse>, ApiError> {
    let sample = request.into_sample()?;

    let response = blocking(&state, move |engine| {
        let recorded = engine.record_sample(&sample);
        let anomalies = engine.detect_anomalies(&sample);
        SampleResponse {
            recorded,
            anomalies,
        }
    })
    .await?;

    Ok(Json(response))
}

/// Generate trend predictions for a service
///
/// GET /api/v1/predictions/:service?horizon_hours=N
async fn predictions(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
    Query(params): Query<PredictionParams>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let config = state.engine.config();
    let horizon_hours = params
        .horizon_hours
        .map_or(config.default_horizon_hours, |h| config.horizon_or_default(h));

    let service = service_name.clone();
    let predictions = blocking(&state, move |engine| {
        engine.generate_predictions(&service, horizon_hours)
    })
    .await?;

    Ok(Json(PredictionResponse {
        service_name,
        horizon_hours,
        predictions,
    }))
}

/// Summary of recent analytics
///
/// GET /api/v1/summary
async fn summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = match params.window_hours {
        Some(0) => return Err(ApiError::BadRequest("window_hours must be positive".into())),
        Some(hours) => blocking(&state, move |engine| engine.summary_for_window(hours)).await?,
        None => blocking(&state, |engine| engine.get_summary()).await?,
    };
    Ok(Json(report))
}

/// Drop the cached baseline of a service
///
/// DELETE /api/v1/baselines/:service
async fn invalidate_baseline(
    State(state): State<Arc<AppState>>,
    Path(service_name): Path<String>,
) -> Json<InvalidateResponse> {
    let invalidated = state.engine.invalidate_baseline(&service_name);
    Json(InvalidateResponse {
        service_name,
        invalidated,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/samples", post(record_sample))
        .route("/api/v1/predictions/:service", get(predictions))
        .route("/api/v1/summary", get(summary))
        .route("/api/v1/baselines/:service", delete(invalidate_baseline))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
