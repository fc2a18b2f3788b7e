//! Bearer credential forwarding.
//!
//! The gateway never validates tokens. It only lifts the bearer value off the
//! inbound request so the orchestrator can hand it to the backend, which owns
//! verification and expiry.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// An opaque bearer token, forwarded verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the outbound `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// No usable bearer credential on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing or malformed bearer credential")]
pub struct MissingCredential;

/// Pull a bearer token out of the `Authorization` header.
pub fn extract(headers: &HeaderMap) -> Result<Credential, MissingCredential> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(MissingCredential)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(MissingCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(MissingCredential);
    }
    Ok(Credential::new(token))
}

impl IntoResponse for MissingCredential {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Access token required",
                "details": "Please login first to get an access token",
            })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = MissingCredential;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract(&parts.headers)
    }
}
