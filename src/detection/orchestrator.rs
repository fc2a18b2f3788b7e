//! Request orchestration for detection calls.
//!
//! One inbound detection maps to at most one upstream attempt, made under the
//! circuit breaker and a hard deadline. The deadline sits inside the breaker
//! so an expired call is counted as a failure.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::detection::classify::classify;
use crate::detection::outcome::{DetectionResult, Outcome};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::CircuitBreaker;
use crate::security::Credential;
use crate::upstream::{Prediction, Upstream, UpstreamError};

/// State of a single in-flight detection. Never shared between requests.
#[derive(Debug)]
pub struct CallAttempt<'a> {
    pub correlation_id: &'a str,
    pub credential: &'a Credential,
    pub started: Instant,
    pub deadline: Instant,
}

impl CallAttempt<'_> {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Runs detection calls against the backend.
pub struct Orchestrator {
    breaker: Arc<CircuitBreaker>,
    upstream: Arc<dyn Upstream>,
    deadline: Duration,
    busy_retry_after: Duration,
}

impl Orchestrator {
    pub fn new(breaker: Arc<CircuitBreaker>, upstream: Arc<dyn Upstream>, config: &UpstreamConfig) -> Self {
        Self {
            breaker,
            upstream,
            deadline: Duration::from_millis(config.timeout_ms),
            busy_retry_after: Duration::from_secs(config.busy_retry_after_secs),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// Classify `text` through the backend and report the outcome.
    pub async fn execute(&self, credential: &Credential, text: &str, correlation_id: &str) -> Outcome {
        self.execute_since(credential, text, correlation_id, Instant::now()).await
    }

    /// [`execute`](Self::execute) for a request first seen at `received`.
    ///
    /// `processingTime` is measured from `received`; the upstream deadline
    /// starts when the call is made.
    pub async fn execute_since(
        &self,
        credential: &Credential,
        text: &str,
        correlation_id: &str,
        received: Instant,
    ) -> Outcome {
        let attempt = CallAttempt {
            correlation_id,
            credential,
            started: received,
            deadline: Instant::now() + self.deadline,
        };

        tracing::debug!(
            request_id = %correlation_id,
            chars = text.chars().count(),
            "Forwarding detection to backend"
        );

        let result = self
            .breaker
            .call(|| {
                with_deadline(
                    attempt.remaining(),
                    self.upstream.predict(attempt.credential, attempt.correlation_id, text),
                    || UpstreamError::Timeout,
                )
            })
            .await;

        let outcome = match result {
            Ok(prediction) => Outcome::Success(package(
                prediction,
                attempt.correlation_id,
                attempt.started.elapsed(),
                Uuid::new_v4(),
                Utc::now(),
            )),
            Err(err) => {
                tracing::warn!(request_id = %correlation_id, error = %err, "Detection call failed");
                classify(err, correlation_id, self.busy_retry_after)
            }
        };

        tracing::info!(
            request_id = %correlation_id,
            outcome = outcome.kind(),
            elapsed_ms = attempt.started.elapsed().as_millis() as u64,
            circuit = %self.breaker.state(),
            "Detection finished"
        );
        metrics::record_outcome(outcome.kind());
        outcome
    }
}

/// Wrap a backend prediction for the caller.
pub fn package(
    prediction: Prediction,
    request_id: &str,
    elapsed: Duration,
    detection_id: Uuid,
    timestamp: DateTime<Utc>,
) -> DetectionResult {
    DetectionResult {
        detection_id,
        classification: prediction.classification,
        confidence: prediction.confidence,
        timestamp,
        processing_time: elapsed.as_millis() as u64,
        request_id: request_id.to_string(),
        user: prediction.user,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::detection::outcome::UnreachableCause;
    use crate::resilience::{CircuitState, ManualClock};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted backend: pops one reply per predict call.
    #[derive(Default)]
    pub(crate) struct FakeUpstream {
        pub replies: Mutex<VecDeque<Result<Prediction, UpstreamError>>>,
        pub delay: Option<Duration>,
        pub calls: AtomicU32,
        pub seen: Mutex<Vec<(String, String)>>,
    }

    impl FakeUpstream {
        pub fn with_replies(replies: Vec<Result<Prediction, UpstreamError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    pub(crate) fn spam() -> Prediction {
        Prediction {
            classification: "spam".into(),
            confidence: 0.98,
            user: Some("alice".into()),
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn predict(
            &self,
            credential: &Credential,
            correlation_id: &str,
            _text: &str,
        ) -> Result<Prediction, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((credential.expose().to_string(), correlation_id.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok(spam()))
        }

        async fn login(&self, _username: &str, _password: &str) -> Result<serde_json::Value, UpstreamError> {
            Ok(serde_json::json!({ "access_token": "tok" }))
        }

        async fn health(&self) -> Result<(), UpstreamError> {
            Ok(())
        }
    }

    fn orchestrator(upstream: Arc<FakeUpstream>, threshold: u32, timeout_ms: u64) -> (Orchestrator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(CircuitBreaker::new(
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                ..CircuitBreakerConfig::default()
            },
            clock.clone(),
        ));
        let config = UpstreamConfig {
            timeout_ms,
            ..UpstreamConfig::default()
        };
        (Orchestrator::new(breaker, upstream, &config), clock)
    }

    fn cred() -> Credential {
        Credential::new("tok-123")
    }

    #[tokio::test]
    async fn test_success_is_packaged_and_identity_forwarded() {
        let upstream = Arc::new(FakeUpstream::default());
        let (orch, _) = orchestrator(upstream.clone(), 5, 5000);

        let outcome = orch.execute(&cred(), "win a prize", "req-1").await;
        match outcome {
            Outcome::Success(result) => {
                assert_eq!(result.classification, "spam");
                assert_eq!(result.confidence, 0.98);
                assert_eq!(result.request_id, "req-1");
                assert_eq!(result.user.as_deref(), Some("alice"));
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(
            upstream.seen.lock().unwrap().as_slice(),
            &[("tok-123".to_string(), "req-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_processing_time_counts_from_receipt() {
        let upstream = Arc::new(FakeUpstream::default());
        let (orch, _) = orchestrator(upstream, 5, 100);
        let received = Instant::now() - Duration::from_millis(250);

        // Time spent before the call does not eat into the upstream deadline.
        match orch.execute_since(&cred(), "win a prize", "req-1", received).await {
            Outcome::Success(result) => assert!(result.processing_time >= 250, "{}", result.processing_time),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_401_is_auth_expired_and_counts_as_failure() {
        let upstream = Arc::new(FakeUpstream::with_replies(vec![Err(UpstreamError::Status {
            status: 401,
            body: "{}".into(),
        })]));
        let (orch, _) = orchestrator(upstream, 5, 5000);

        assert_eq!(orch.execute(&cred(), "hi", "req-2").await, Outcome::AuthExpired);
        assert_eq!(orch.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_401_while_half_open_is_still_auth_expired() {
        let unauthorized = || Err(UpstreamError::Status { status: 401, body: String::new() });
        let upstream = Arc::new(FakeUpstream::with_replies(vec![
            Err(UpstreamError::Timeout),
            Ok(spam()),
            unauthorized(),
        ]));
        let (orch, clock) = orchestrator(upstream, 1, 5000);

        orch.execute(&cred(), "hi", "a").await;
        assert_eq!(orch.breaker().state(), CircuitState::Open);
        clock.advance(Duration::from_secs(61));
        assert!(orch.execute(&cred(), "hi", "b").await.is_success());
        assert_eq!(orch.breaker().state(), CircuitState::HalfOpen);

        assert_eq!(orch.execute(&cred(), "hi", "c").await, Outcome::AuthExpired);
        // Threshold 1: the counted failure reopens.
        assert_eq!(orch.breaker().state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout_and_counts_as_failure() {
        let upstream = Arc::new(FakeUpstream {
            delay: Some(Duration::from_secs(2)),
            ..FakeUpstream::default()
        });
        let (orch, _) = orchestrator(upstream, 5, 50);

        let outcome = orch.execute(&cred(), "slow", "req-3").await;
        assert_eq!(outcome, Outcome::Unreachable { cause: UnreachableCause::TimedOut });
        assert_eq!(orch.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_open_breaker_rejects_without_calling_backend() {
        let upstream = Arc::new(FakeUpstream::with_replies(vec![
            Err(UpstreamError::Connect("refused".into())),
            Err(UpstreamError::Connect("refused".into())),
        ]));
        let (orch, clock) = orchestrator(upstream.clone(), 2, 5000);

        for _ in 0..2 {
            assert_eq!(
                orch.execute(&cred(), "hi", "x").await,
                Outcome::Unreachable { cause: UnreachableCause::Refused }
            );
        }
        clock.advance(Duration::from_secs(5));

        match orch.execute(&cred(), "hi", "y").await {
            Outcome::Rejected { retry_after } => assert_eq!(retry_after, Duration::from_secs(55)),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_busy_and_generic_upstream_errors() {
        let upstream = Arc::new(FakeUpstream::with_replies(vec![
            Err(UpstreamError::Status { status: 503, body: r#"{"error":"overloaded"}"#.into() }),
            Err(UpstreamError::Status { status: 500, body: "trace".into() }),
            Err(UpstreamError::Decode("expected f64".into())),
        ]));
        let (orch, _) = orchestrator(upstream, 10, 5000);

        assert_eq!(
            orch.execute(&cred(), "hi", "r").await,
            Outcome::UpstreamBusy { retry_after: Duration::from_secs(60), detail: "overloaded".into() }
        );
        assert_eq!(
            orch.execute(&cred(), "hi", "r").await,
            Outcome::UpstreamError { status: 500, body: "trace".into() }
        );
        assert!(matches!(
            orch.execute(&cred(), "hi", "r").await,
            Outcome::InternalError { ref request_id, .. } if request_id == "r"
        ));
        assert_eq!(orch.breaker().snapshot().failure_count, 3);
    }

    #[test]
    fn test_package_is_a_plain_transform() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let result = package(spam(), "req-7", Duration::from_millis(1234), id, now);
        assert_eq!(result.detection_id, id);
        assert_eq!(result.timestamp, now);
        assert_eq!(result.processing_time, 1234);
        assert_eq!(result.request_id, "req-7");
    }
}
