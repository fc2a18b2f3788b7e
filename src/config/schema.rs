//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::resilience::HalfOpenFailurePolicy;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Classification backend endpoints and deadlines.
    pub upstream: UpstreamConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Input validation limits.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Classification backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the backend (e.g., "http://localhost:5000").
    pub base_url: String,

    /// Path of the prediction endpoint.
    pub predict_path: String,

    /// Path of the login endpoint.
    pub login_path: String,

    /// Path probed by the gateway health check.
    pub health_path: String,

    /// Deadline for predict and login calls in milliseconds.
    pub timeout_ms: u64,

    /// Deadline for the health probe in milliseconds.
    pub health_timeout_ms: u64,

    /// Retry hint returned to callers when the backend reports 503.
    pub busy_retry_after_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            predict_path: "/api/ml/predict".to_string(),
            login_path: "/auth/login".to_string(),
            health_path: "/health".to_string(),
            timeout_ms: 5000,
            health_timeout_ms: 2000,
            busy_retry_after_secs: 60,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// How long the circuit stays open, in milliseconds.
    pub open_timeout_ms: u64,

    /// Consecutive half-open successes before the circuit closes.
    pub successes_to_close: u32,

    /// Behavior of a failed half-open probe.
    pub half_open_failure: HalfOpenFailurePolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_ms: 60_000,
            successes_to_close: 2,
            half_open_failure: HalfOpenFailurePolicy::Count,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on `/api/*`.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per client IP per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

/// Detection input limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum email text length in characters.
    pub max_text_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "spam_gateway=info,tower_http=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
