use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::CircuitState;
use crate::security::Credential;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStatus {
    pub status: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: &'static str,
    pub status: CircuitState,
}

/// `GET /api/circuit/status`
pub async fn get_circuit_status(State(state): State<AppState>) -> Json<CircuitStatus> {
    let snapshot = state.orchestrator.breaker().snapshot();
    Json(CircuitStatus {
        status: snapshot.state,
        failure_count: snapshot.failure_count,
        threshold: snapshot.failure_threshold,
        retry_after: snapshot
            .open_remaining
            .map(crate::detection::outcome::retry_after_secs),
    })
}

/// `POST /api/circuit/reset`
///
/// Requires a bearer credential like the detection call; the token itself is
/// not checked here.
pub async fn reset_circuit(
    State(state): State<AppState>,
    _credential: Credential,
) -> Json<ResetResponse> {
    let breaker = state.orchestrator.breaker();
    breaker.reset();
    Json(ResetResponse {
        message: "Circuit breaker reset",
        status: breaker.state(),
    })
}
