//! Fixed-window rate limiting middleware.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Request count inside the current window.
struct Window {
    started: Instant,
    count: u32,
}

/// Verdict for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { retry_after: Duration },
}

/// Per-client fixed-window counters.
///
/// Expired windows are swept at most once per window length, so the map only
/// holds clients seen during the current window.
pub struct RateLimiterState {
    windows: DashMap<String, Window>,
    last_sweep: Mutex<Instant>,
    window: Duration,
    max_requests: u32,
    enabled: bool,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            enabled: config.enabled,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allow;
        }

        self.sweep_expired(now);

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window { started: now, count: 0 });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            Decision::Allow
        } else {
            Decision::Deny {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }
}

impl RateLimiterState {
    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    fn sweep_expired(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now.saturating_duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }

        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        tracing::debug!(evicted = before.saturating_sub(self.windows.len()), "Swept expired rate limit windows");
    }
}

/// Middleware limiting `/api/*` traffic per client IP.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.check(&key) {
        Decision::Allow => next.run(request).await,
        Decision::Deny { retry_after } => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            let secs = retry_after.as_secs_f64().ceil() as u64;
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many requests, please try again later." })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
