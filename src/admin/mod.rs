//! Circuit breaker diagnostics and operational reset.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/api/circuit/status", get(get_circuit_status))
        .route("/api/circuit/reset", post(reset_circuit))
}
