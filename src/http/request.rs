//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the caller sent none
//! - Expose the request ID to handlers as the correlation id
//! - Validate detection input before it reaches the backend
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Validation errors are 400s with a short `error` and a `details` hint

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(RequestId(id))
    }
}

/// Rejected detection input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Email text is required")]
    Missing,
    #[error("Invalid input type")]
    NotString,
    #[error("Email text cannot be empty")]
    Empty,
    #[error("Email text too long")]
    TooLong { max: usize },
    #[error("Invalid JSON body")]
    Malformed,
}

impl InputError {
    fn details(&self) -> String {
        match self {
            InputError::Missing => "Request body must contain a \"text\" field".to_string(),
            InputError::NotString => "Email text must be a string".to_string(),
            InputError::Empty => "Please provide email content to analyze".to_string(),
            InputError::TooLong { max } => format!("Maximum length is {} characters", max),
            InputError::Malformed => "Request body must be a JSON object".to_string(),
        }
    }
}

impl IntoResponse for InputError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string(), "details": self.details() })),
        )
            .into_response()
    }
}

/// Pull the email text out of a detection body.
pub fn validate_text(body: &Value, max_chars: usize) -> Result<&str, InputError> {
    let text = match body.get("text") {
        None | Some(Value::Null) => return Err(InputError::Missing),
        Some(Value::String(s)) if s.is_empty() => return Err(InputError::Missing),
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(InputError::NotString),
    };

    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    if text.chars().count() > max_chars {
        return Err(InputError::TooLong { max: max_chars });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_text() {
        let body = json!({ "text": "Congratulations, you won!" });
        assert_eq!(validate_text(&body, 100), Ok("Congratulations, you won!"));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validate_text(&json!({}), 100), Err(InputError::Missing));
        assert_eq!(validate_text(&json!({ "text": "" }), 100), Err(InputError::Missing));
        assert_eq!(validate_text(&json!({ "text": 42 }), 100), Err(InputError::NotString));
        assert_eq!(validate_text(&json!({ "text": "   \n" }), 100), Err(InputError::Empty));
        assert_eq!(
            validate_text(&json!({ "text": "abcdef" }), 5),
            Err(InputError::TooLong { max: 5 })
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let body = json!({ "text": "ééééé" });
        assert!(validate_text(&body, 5).is_ok());
    }
}
