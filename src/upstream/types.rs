//! Wire types for the classification backend.

use serde::{Deserialize, Serialize};

/// Body of `POST {predict_path}`.
#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub email_text: &'a str,
}

/// Successful prediction returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Prediction {
    /// "spam" or "ham".
    pub classification: String,
    pub confidence: f64,
    /// Identity the backend resolved from the forwarded token.
    #[serde(default)]
    pub user: Option<String>,
}

/// Body of `POST {login_path}`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Low-level failure of a backend call, before classification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    /// The call did not finish before its deadline.
    #[error("upstream call timed out")]
    Timeout,
    /// The connection could not be established (refused, DNS, reset on connect).
    #[error("could not connect to upstream: {0}")]
    Connect(String),
    /// The backend answered with a non-2xx status.
    #[error("upstream responded with status {status}")]
    Status { status: u16, body: String },
    /// A 2xx response whose body could not be decoded.
    #[error("invalid upstream response: {0}")]
    Decode(String),
    /// Any other transport failure.
    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Connect(e.to_string())
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}
