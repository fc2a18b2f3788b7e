//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("invalid upstream base_url '{0}'")]
    UpstreamUrl(String),
    #[error("upstream path '{0}' must start with '/'")]
    UpstreamPath(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let upstream = &config.upstream;
    match Url::parse(&upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::UpstreamUrl(upstream.base_url.clone())),
    }
    for path in [&upstream.predict_path, &upstream.login_path, &upstream.health_path] {
        if !path.starts_with('/') {
            errors.push(ValidationError::UpstreamPath(path.clone()));
        }
    }

    let positive = [
        ("upstream.timeout_ms", upstream.timeout_ms),
        ("upstream.health_timeout_ms", upstream.health_timeout_ms),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("circuit_breaker.open_timeout_ms", config.circuit_breaker.open_timeout_ms),
        ("circuit_breaker.successes_to_close", config.circuit_breaker.successes_to_close as u64),
        ("validation.max_text_chars", config.validation.max_text_chars as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::Zero("rate_limit.window_ms"));
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::Zero("rate_limit.max_requests"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
