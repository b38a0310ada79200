//! Error responses at the HTTP boundary.
//!
//! # Responsibilities
//! - Define the single JSON error envelope used for every rejection
//! - Map handler failures (unknown route, bad body, internal error) to it
//! - Rewrite bare error responses from the framework and tower layers
//!   (405, 408, 413) into the envelope
//!
//! # Design Decisions
//! - Every response builds a fresh envelope value; nothing is shared
//! - Internal error detail is logged, never sent to the client

use axum::{
    extract::rejection::JsonRejection,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOO_MANY_REQUESTS: &str = "Too many requests";
pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable";

/// `{ message, error: { message, status } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub status: u16,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: ErrorDetail {
                message: message.clone(),
                status: status.as_u16(),
            },
            message,
        }
    }

    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS)
    }

    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, SERVICE_UNAVAILABLE)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Failure raised by a route handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request body could not be extracted; carries the extractor's status.
    #[error("rejected body ({status}): {detail}")]
    Body { status: StatusCode, detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Body {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let envelope = match &self {
            AppError::Body { status, detail } => ErrorEnvelope::new(*status, detail.clone()),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Unhandled handler error");
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        envelope.into_response()
    }
}

/// Replace the body of an error response that is not already JSON with the
/// envelope for its status. Other headers (`Allow`, `Retry-After`) are kept.
pub async fn envelope_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(response.headers()) {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_TYPE);
    parts.headers.remove(CONTENT_LENGTH);

    let message = status.canonical_reason().unwrap_or("Request failed");
    let mut rewritten = ErrorEnvelope::new(status, message).into_response();
    for (name, value) in parts.headers.iter() {
        rewritten.headers_mut().entry(name).or_insert_with(|| value.clone());
    }
    rewritten
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ErrorEnvelope::too_many_requests()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Too many requests",
                "error": { "message": "Too many requests", "status": 429 }
            })
        );
    }

    #[test]
    fn test_envelopes_are_independent() {
        let mut first = ErrorEnvelope::too_many_requests();
        first.message.push_str(" (mutated)");
        let second = ErrorEnvelope::too_many_requests();
        assert_eq!(second.message, TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let response = AppError::Internal("db password wrong".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope.message, "Internal server error");
        assert_eq!(envelope.error.status, 500);
    }

    #[test]
    fn test_status_code_round_trip() {
        assert_eq!(ErrorEnvelope::service_unavailable().status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body_error = AppError::Body {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            detail: "too big".into(),
        };
        assert_eq!(body_error.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_bare_errors_are_rewritten() {
        let bare = (
            StatusCode::METHOD_NOT_ALLOWED,
            [(axum::http::header::ALLOW, "POST")],
            "",
        )
            .into_response();

        let response = envelope_errors(bare).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "POST");
        assert_eq!(response.headers()["content-type"], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope.message, "Method Not Allowed");
        assert_eq!(envelope.error.status, 405);
    }

    #[tokio::test]
    async fn test_json_and_success_responses_pass_through() {
        let ok = envelope_errors("fine".into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["content-type"], "text/plain; charset=utf-8");

        let original = ErrorEnvelope::too_many_requests();
        let response = envelope_errors(original.clone().into_response()).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope, original);
    }
}
