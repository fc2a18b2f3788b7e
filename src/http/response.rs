//! Response mapping.
//!
//! # Responsibilities
//! - Map each detection `Outcome` to its fixed status code and JSON body
//! - Attach `Retry-After` when the caller is told to come back later
//!
//! # Design Decisions
//! - The mapping is total: every outcome has exactly one response shape
//! - Internal error details stay in the logs

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::detection::outcome::{retry_after_secs, Outcome, UnreachableCause};

impl Outcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::Rejected { .. } | Outcome::Unreachable { .. } | Outcome::UpstreamBusy { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Outcome::AuthExpired => StatusCode::UNAUTHORIZED,
            Outcome::UpstreamError { .. } | Outcome::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut retry_after = None;

        let body = match self {
            Outcome::Success(result) => return (status, Json(result)).into_response(),
            Outcome::Rejected { retry_after: wait } => {
                let secs = retry_after_secs(wait);
                retry_after = Some(secs);
                json!({
                    "error": "Service temporarily unavailable",
                    "details": "The ML service is currently experiencing issues. Please try again later.",
                    "circuitBreaker": "OPEN",
                    "retryAfter": secs,
                })
            }
            Outcome::Unreachable { cause } => json!({
                "error": "service unavailable",
                "details": match cause {
                    UnreachableCause::Refused => "Could not connect to the spam detection service.",
                    UnreachableCause::TimedOut => "The spam detection service did not respond in time.",
                },
            }),
            Outcome::AuthExpired => json!({
                "error": "Authentication failed",
                "details": "Your session has expired. Please login again.",
                "requiresLogin": true,
            }),
            Outcome::UpstreamBusy { retry_after: wait, detail } => {
                let secs = retry_after_secs(wait);
                retry_after = Some(secs);
                json!({
                    "error": "ML service busy",
                    "details": detail,
                    "retryAfter": secs,
                })
            }
            Outcome::UpstreamError { status: upstream_status, body } => json!({
                "error": "Upstream service error",
                "upstreamStatus": upstream_status,
                "upstreamBody": body,
            }),
            Outcome::InternalError { request_id, .. } => json!({
                "error": "Internal server error",
                "details": "An error occurred while processing your request",
                "requestId": request_id,
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
