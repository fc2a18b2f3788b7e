//! Gateway endpoint handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;

use crate::detection::Outcome;
use crate::http::request::{validate_text, InputError, RequestId};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::Credential;
use crate::storage::DetectionRecord;
use crate::upstream::UpstreamError;

/// `POST /api/detect`
pub async fn detect(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    credential: Credential,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(request_id = %request_id, error = %rejection, "Unreadable detection body");
            metrics::record_request("detect", 400, start);
            return InputError::Malformed.into_response();
        }
    };
    let text = match validate_text(&body, state.validation.max_text_chars) {
        Ok(text) => text,
        Err(e) => {
            metrics::record_request("detect", 400, start);
            return e.into_response();
        }
    };

    let outcome = state
        .orchestrator
        .execute_since(&credential, text, &request_id, start)
        .await;

    if let Outcome::Success(result) = &outcome {
        let record = DetectionRecord {
            result: result.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = state.store.record(record).await {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to store detection");
            metrics::record_store_failure();
        }
    }

    metrics::record_request("detect", outcome.status_code().as_u16(), start);
    outcome.into_response()
}

/// `POST /api/auth/login`, relayed to the backend without the breaker.
pub async fn login(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let field = |name: &str| body.get(name).and_then(Value::as_str).filter(|s| !s.is_empty());

    let (Some(username), Some(password)) = (field("username"), field("password")) else {
        metrics::record_request("login", 400, start);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username and password required" })),
        )
            .into_response();
    };

    let response = match state.orchestrator.upstream().login(username, password).await {
        Ok(token) => (StatusCode::OK, Json(token)).into_response(),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Login relay failed");
            login_failure(e)
        }
    };
    metrics::record_request("login", response.status().as_u16(), start);
    response
}

fn login_failure(err: UpstreamError) -> Response {
    let (status, body) = match err {
        UpstreamError::Status { status: 401, .. } => (
            StatusCode::UNAUTHORIZED,
            json!({
                "error": "Invalid credentials",
                "details": "Username or password is incorrect",
            }),
        ),
        UpstreamError::Connect(_) | UpstreamError::Timeout => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": "Authentication service unavailable",
                "details": "Could not connect to authentication service",
            }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Login failed",
                "details": "An error occurred during login",
            }),
        ),
    };
    (status, Json(body)).into_response()
}

/// `GET /api/stats`
pub async fn stats(State(state): State<AppState>, _credential: Credential) -> Response {
    match state.store.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Stats query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to retrieve statistics" })),
            )
                .into_response()
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let ml_service = match state.orchestrator.upstream().health().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::debug!(error = %e, "Backend health probe failed");
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "circuitBreaker": state.orchestrator.breaker().state(),
        "services": {
            "store": state.store.describe(),
            "mlService": ml_service,
        },
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
