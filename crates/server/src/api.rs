//! HTTP API: prediction, health, readiness, metrics and the demo form

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::{error, info};
use usage_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    inference::{parse_request, InferenceService, ModelState},
    observability::{StructuredLogger, UsageMetrics},
    PredictError, PredictionResponse,
};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared application state
pub struct AppState {
    pub inference: InferenceService,
    pub health_registry: HealthRegistry,
    pub metrics: UsageMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    /// Load the artifact once and record the outcome in the health registry
    pub async fn initialize(model_path: &Path) -> Self {
        let health_registry = HealthRegistry::new();
        health_registry.register(components::MODEL).await;
        health_registry
            .set_degraded(components::MODEL, "Loading pipeline")
            .await;

        let mut inference = InferenceService::new();
        match inference.load(model_path) {
            ModelState::Ready(_) => {
                health_registry.set_healthy(components::MODEL).await;
                health_registry.set_ready(true).await;
            }
            ModelState::LoadFailed { reason, missing } => {
                let reason = format!("Model not loaded: {}", reason);
                if *missing {
                    // Nothing trained yet; the process itself is fine
                    health_registry
                        .set_degraded(components::MODEL, reason.clone())
                        .await;
                } else {
                    health_registry
                        .set_unhealthy(components::MODEL, reason.clone())
                        .await;
                }
                health_registry.set_not_ready_reason(reason).await;
            }
            ModelState::Uninitialized | ModelState::Loading => {}
        }

        Self {
            inference,
            health_registry,
            metrics: UsageMetrics::new(),
            logger: StructuredLogger::new("usage-server"),
        }
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Classify one station from its feature vector
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            state.metrics.inc_rejected();
            state.logger.log_rejected(&e.to_string());
            return error_body(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e));
        }
    };

    let features = match parse_request(&value) {
        Ok(f) => f,
        Err(e) => {
            state.metrics.inc_rejected();
            state.logger.log_rejected(&e.to_string());
            return error_body(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.inference.predict(&features) {
        Ok(label) => (
            StatusCode::OK,
            Json(PredictionResponse {
                predicted_usage_level: label,
            }),
        )
            .into_response(),
        Err(e @ PredictError::NotReady(_)) => {
            state.metrics.inc_prediction_errors();
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Prediction failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed")
        }
    }
}

/// 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// 200 only when a pipeline is serving
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Handler panicked");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
