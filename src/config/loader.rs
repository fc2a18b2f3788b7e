//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    let config = apply_env_overrides(config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the deployment environment variables on top of `config`.
///
/// `lookup` abstracts `std::env::var` so overrides can be tested without
/// touching the process environment.
pub fn apply_env_overrides<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parse_var::<u16, _>(&lookup, "PORT")? {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(url) = lookup("ML_SERVICE_URL") {
        config.upstream.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(v) = parse_var(&lookup, "CIRCUIT_FAILURE_THRESHOLD")? {
        config.circuit_breaker.failure_threshold = v;
    }
    if let Some(v) = parse_var(&lookup, "CIRCUIT_TIMEOUT_MS")? {
        config.circuit_breaker.open_timeout_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "RATE_LIMIT_WINDOW_MS")? {
        config.rate_limit.window_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "RATE_LIMIT_MAX_REQUESTS")? {
        config.rate_limit.max_requests = v;
    }
    Ok(config)
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        None => Ok(None),
    }
}
