//! Caller-facing result of one detection call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Successful detection as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub detection_id: Uuid,
    pub classification: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds spent between receiving the request and the backend's answer.
    pub processing_time: u64,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Why the backend could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableCause {
    Refused,
    TimedOut,
}

/// Classified outcome of a detection call.
///
/// Every failure path ends in exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(DetectionResult),
    /// Refused by the open breaker; the backend was not called.
    Rejected { retry_after: Duration },
    Unreachable { cause: UnreachableCause },
    /// Backend rejected the forwarded credential.
    AuthExpired,
    /// Backend reported 503.
    UpstreamBusy { retry_after: Duration, detail: String },
    /// Any other non-2xx backend response.
    UpstreamError { status: u16, body: String },
    /// Unexpected failure; `detail` is for logs only.
    InternalError { request_id: String, detail: String },
}

impl Outcome {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Rejected { .. } => "rejected",
            Outcome::Unreachable { cause: UnreachableCause::Refused } => "unreachable",
            Outcome::Unreachable { cause: UnreachableCause::TimedOut } => "timeout",
            Outcome::AuthExpired => "auth_expired",
            Outcome::UpstreamBusy { .. } => "upstream_busy",
            Outcome::UpstreamError { .. } => "upstream_error",
            Outcome::InternalError { .. } => "internal_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Whole seconds a caller should wait, rounded up.
pub fn retry_after_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
