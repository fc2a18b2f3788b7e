//! Failure classification.
//!
//! Maps whatever went wrong on the upstream call path to one [`Outcome`],
//! checked in this order:
//!
//! ```text
//! breaker rejection          → Rejected
//! connect failure / timeout  → Unreachable
//! HTTP 401                   → AuthExpired
//! HTTP 503                   → UpstreamBusy
//! other non-2xx              → UpstreamError
//! anything else              → InternalError
//! ```

use std::time::Duration;

use crate::detection::outcome::{Outcome, UnreachableCause};
use crate::resilience::BreakerError;
use crate::upstream::UpstreamError;

const DEFAULT_BUSY_DETAIL: &str = "Service is temporarily overloaded";

pub fn classify(err: BreakerError<UpstreamError>, request_id: &str, busy_retry_after: Duration) -> Outcome {
    let err = match err {
        BreakerError::Open { retry_after } => return Outcome::Rejected { retry_after },
        BreakerError::Inner(err) => err,
    };

    match err {
        UpstreamError::Connect(_) => Outcome::Unreachable {
            cause: UnreachableCause::Refused,
        },
        UpstreamError::Timeout => Outcome::Unreachable {
            cause: UnreachableCause::TimedOut,
        },
        UpstreamError::Status { status: 401, .. } => Outcome::AuthExpired,
        UpstreamError::Status { status: 503, body } => Outcome::UpstreamBusy {
            retry_after: busy_retry_after,
            detail: busy_detail(&body),
        },
        UpstreamError::Status { status, body } => Outcome::UpstreamError { status, body },
        other @ (UpstreamError::Decode(_) | UpstreamError::Transport(_)) => Outcome::InternalError {
            request_id: request_id.to_string(),
            detail: other.to_string(),
        },
    }
}

/// The backend's own `error` message, when it sent one.
fn busy_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BUSY_DETAIL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUSY: Duration = Duration::from_secs(60);

    fn inner(err: UpstreamError) -> Outcome {
        classify(BreakerError::Inner(err), "req-9", BUSY)
    }

    fn status(status: u16, body: &str) -> UpstreamError {
        UpstreamError::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_breaker_rejection_wins() {
        let outcome = classify(
            BreakerError::Open { retry_after: Duration::from_secs(42) },
            "req-9",
            BUSY,
        );
        assert_eq!(outcome, Outcome::Rejected { retry_after: Duration::from_secs(42) });
    }

    #[test]
    fn test_transport_failures_are_unreachable() {
        assert_eq!(
            inner(UpstreamError::Connect("refused".into())),
            Outcome::Unreachable { cause: UnreachableCause::Refused }
        );
        assert_eq!(
            inner(UpstreamError::Timeout),
            Outcome::Unreachable { cause: UnreachableCause::TimedOut }
        );
    }

    #[test]
    fn test_401_is_auth_expired() {
        assert_eq!(inner(status(401, r#"{"error":"Token expired"}"#)), Outcome::AuthExpired);
    }

    #[test]
    fn test_503_is_busy_with_backend_detail() {
        assert_eq!(
            inner(status(503, r#"{"error":"Model is warming up"}"#)),
            Outcome::UpstreamBusy {
                retry_after: BUSY,
                detail: "Model is warming up".into(),
            }
        );
        assert_eq!(
            inner(status(503, "<html>busy</html>")),
            Outcome::UpstreamBusy {
                retry_after: BUSY,
                detail: DEFAULT_BUSY_DETAIL.into(),
            }
        );
    }

    #[test]
    fn test_other_status_keeps_status_and_body() {
        assert_eq!(
            inner(status(422, "bad text")),
            Outcome::UpstreamError {
                status: 422,
                body: "bad text".into(),
            }
        );
    }

    #[test]
    fn test_everything_else_is_internal() {
        match inner(UpstreamError::Decode("missing field `confidence`".into())) {
            Outcome::InternalError { request_id, detail } => {
                assert_eq!(request_id, "req-9");
                assert!(detail.contains("confidence"));
            }
            other => panic!("expected internal error, got {:?}", other),
        }
        assert!(matches!(
            inner(UpstreamError::Transport("connection reset".into())),
            Outcome::InternalError { .. }
        ));
    }
}
