//! Circuit breaker guarding the classification backend.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: probing whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      failure_count >= failure_threshold
//! Open      → Half-Open: first attempt after open_until
//! Half-Open → Closed:    success_count >= successes_to_close
//! Half-Open → Open:      failure_count >= failure_threshold
//!                        (or any failure with HalfOpenFailurePolicy::Reopen)
//! ```
//!
//! # Design Decisions
//! - One breaker for all detection traffic, injected through `AppState`
//! - Any success resets the failure counter (no decay window)
//! - Every check-and-transition runs under a single mutex; the lock is never
//!   held across the guarded operation's `.await`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::Clock;

/// Breaker state as exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding used by `gateway_circuit_state`.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a failure while Half-Open does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenFailurePolicy {
    /// Count the failure like any other; reopen only at the threshold.
    #[default]
    Count,
    /// Reopen on the first failed probe.
    Reopen,
}

/// The call was refused without reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker is open, retry after {}s", .retry_after.as_secs())]
pub struct Rejected {
    pub retry_after: Duration,
}

/// Failure of a guarded call.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// Rejected by the breaker; the operation was never invoked.
    #[error("circuit breaker is open, retry after {}s", .retry_after.as_secs())]
    Open { retry_after: Duration },
    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    /// Remaining cooldown while Open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    open_until: Option<Instant>,
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    successes_to_close: u32,
    open_timeout: Duration,
    half_open_failure: HalfOpenFailurePolicy,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            successes_to_close: config.successes_to_close.max(1),
            open_timeout: Duration::from_millis(config.open_timeout_ms),
            half_open_failure: config.half_open_failure,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                open_until: None,
            }),
        }
    }

    /// Run `op` under the breaker.
    ///
    /// The operation's own error is returned unchanged as
    /// [`BreakerError::Inner`] after it has been counted.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()
            .map_err(|r| BreakerError::Open { retry_after: r.retry_after })?;

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Ask for permission to attempt a call.
    ///
    /// An expired Open state moves to Half-Open here, before the attempt.
    pub fn try_acquire(&self) -> Result<(), Rejected> {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            if let Some(until) = inner.open_until {
                if now < until {
                    return Err(Rejected { retry_after: until - now });
                }
            }
            inner.success_count = 0;
            Self::transition(&mut inner, CircuitState::HalfOpen);
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.successes_to_close {
                inner.success_count = 0;
                inner.open_until = None;
                Self::transition(&mut inner, CircuitState::Closed);
            }
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);

        tracing::debug!(
            failures = inner.failure_count,
            threshold = self.failure_threshold,
            state = %inner.state,
            "Circuit breaker recorded failure"
        );

        let reopen_probe = inner.state == CircuitState::HalfOpen
            && self.half_open_failure == HalfOpenFailurePolicy::Reopen;

        if reopen_probe || inner.failure_count >= self.failure_threshold {
            inner.open_until = Some(now + self.open_timeout);
            inner.success_count = 0;
            Self::transition(&mut inner, CircuitState::Open);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = self.clock.now();
        let inner = self.lock();
        let open_remaining = match (inner.state, inner.open_until) {
            (CircuitState::Open, Some(until)) if until > now => Some(until - now),
            _ => None,
        };
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            failure_threshold: self.failure_threshold,
            open_remaining,
        }
    }

    /// Force Closed with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.open_until = None;
        Self::transition(&mut inner, CircuitState::Closed);
        tracing::info!("Circuit breaker reset");
    }

    fn transition(inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        metrics::record_circuit_state(to);
        if from == to {
            return;
        }
        match to {
            CircuitState::Open => tracing::warn!(
                from = %from,
                failures = inner.failure_count,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(from = %from, to = %to, "Circuit breaker transition"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
