//! HTTP ingestion boundary.
//!
//! - `POST /signal`: validate and ingest one signal
//! - `GET /health`: liveness

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::domain::Severity;
use crate::ingestion::{
    SignalIngestionResult, SignalIngestionService, SignalIngestionStatus, SignalSubmission,
};

/// `Idempotency-Key` header; wins over the body field when not blank.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Build the HTTP router.
pub fn router(ingestion: Arc<SignalIngestionService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/signal", post(signal_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ingestion)
}

/// Serve the router until `shutdown` resolves.
pub async fn serve(
    ingestion: Arc<SignalIngestionService>,
    addr: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Signal API listening");

    axum::serve(listener, router(ingestion))
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    pub component: String,
    pub severity: String,
    pub source: String,
    pub occurred_at: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalAcceptedResponse {
    pub status: String,
    pub queue_utilization: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn error_response(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn validation_error(message: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        ErrorResponse::new("validation_error", message),
    )
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn signal_handler(
    State(ingestion): State<Arc<SignalIngestionService>>,
    headers: HeaderMap,
    payload: Result<Json<SignalRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_json", "Request body must be valid JSON"),
        );
    };

    let submission = match validate(&headers, request) {
        Ok(submission) => submission,
        Err(response) => return response,
    };

    match ingestion.ingest(submission).await {
        Ok(result) => respond(result),
        Err(e) => {
            error!(error = %e, "Signal ingestion failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", "signal could not be recorded"),
            )
        }
    }
}

fn validate(headers: &HeaderMap, request: SignalRequest) -> Result<SignalSubmission, Response> {
    let component = request.component.trim();
    if component.is_empty() {
        return Err(validation_error("component must be non-empty"));
    }

    let source = request.source.trim();
    if source.is_empty() {
        return Err(validation_error("source must be non-empty"));
    }

    let severity: Severity = request
        .severity
        .parse()
        .map_err(|_| validation_error("severity must be INFO, WARNING, or CRITICAL"))?;

    let occurred_at = DateTime::parse_from_rfc3339(request.occurred_at.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| validation_error("occurredAt must be ISO-8601 instant"))?;

    let header_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string);
    let idempotency_key =
        header_key.or_else(|| request.idempotency_key.filter(|k| !k.trim().is_empty()));

    Ok(SignalSubmission {
        component: component.to_string(),
        severity,
        occurred_at,
        source: source.to_string(),
        idempotency_key,
    })
}

fn respond(result: SignalIngestionResult) -> Response {
    match result.status {
        SignalIngestionStatus::Accepted | SignalIngestionStatus::Duplicate => {
            let status = if result.status == SignalIngestionStatus::Accepted {
                StatusCode::ACCEPTED
            } else {
                StatusCode::OK
            };
            let body = SignalAcceptedResponse {
                status: result.status.as_str().to_string(),
                queue_utilization: result.queue_utilization,
            };
            (status, Json(body)).into_response()
        }
        SignalIngestionStatus::UnknownComponent => error_response(
            StatusCode::NOT_FOUND,
            ErrorResponse::new("unknown_component", "component is not registered"),
        ),
        SignalIngestionStatus::Backpressure => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorResponse {
                details: Some(format!("queueUtilization={:.3}", result.queue_utilization)),
                ..ErrorResponse::new("backpressure", "ingestion queue is full")
            },
        ),
    }
}
