//! HTTP client for the classification backend.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::security::Credential;
use crate::upstream::types::{LoginRequest, PredictRequest, Prediction, UpstreamError};
use crate::http::X_REQUEST_ID;

/// Calls the gateway makes to the classification backend.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Classify `text` on behalf of the caller identified by `credential`.
    async fn predict(
        &self,
        credential: &Credential,
        correlation_id: &str,
        text: &str,
    ) -> Result<Prediction, UpstreamError>;

    /// Exchange username and password for a token; the body is relayed as-is.
    async fn login(&self, username: &str, password: &str) -> Result<serde_json::Value, UpstreamError>;

    /// Probe the backend's health endpoint.
    async fn health(&self) -> Result<(), UpstreamError>;
}

/// `reqwest`-backed [`Upstream`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    predict_url: Url,
    login_url: Url,
    health_url: Url,
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            predict_url: endpoint(&config.base_url, &config.predict_path)?,
            login_url: endpoint(&config.base_url, &config.login_path)?,
            health_url: endpoint(&config.base_url, &config.health_path)?,
            timeout: Duration::from_millis(config.timeout_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url, UpstreamError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| UpstreamError::Transport(format!("invalid upstream url '{}': {}", raw, e)))
}

/// Turn a non-2xx response into [`UpstreamError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn predict(
        &self,
        credential: &Credential,
        correlation_id: &str,
        text: &str,
    ) -> Result<Prediction, UpstreamError> {
        let response = self
            .client
            .post(self.predict_url.clone())
            .bearer_auth(credential.expose())
            .header(X_REQUEST_ID, correlation_id)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(&PredictRequest { email_text: text })
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .json::<Prediction>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn login(&self, username: &str, password: &str) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .client
            .post(self.login_url.clone())
            .timeout(self.timeout)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn health(&self) -> Result<(), UpstreamError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .timeout(self.health_timeout)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}
