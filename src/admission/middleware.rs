//! Admission middleware.
//!
//! Runs every request through the [`AdmissionPipeline`] before it reaches a
//! route handler and turns the verdict into HTTP: admitted requests go to
//! `next`, rejected ones get the error envelope.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::pipeline::{AdmissionPipeline, AdmissionRequest, Denial, QuotaHeaders};
use crate::http::request::request_id;

pub const RATELIMIT_POLICY: &str = "ratelimit-policy";
pub const RATELIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "ratelimit-reset";

/// Middleware function gating every request.
pub async fn admission_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    // Also picks up `MockConnectInfo` when the router is driven in-process.
    let peer = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr);

    let mut admission = AdmissionRequest::new(parts.method.clone(), parts.uri.path());
    if let Some(peer) = peer {
        admission = admission.with_peer(peer);
    }
    if let Some(id) = request_id(&parts.headers) {
        admission = admission.with_request_id(id);
    }

    let verdict = pipeline.evaluate(&admission).await;

    let mut response = match verdict.denial() {
        None => next.run(Request::from_parts(parts, body)).await,
        Some(denial) => denial_response(denial),
    };

    if let Some(quota) = verdict.quota {
        apply_quota_headers(response.headers_mut(), &quota);
    }
    response
}

/// Envelope response for `denial`, with `Retry-After` when known.
pub fn denial_response(denial: &Denial) -> Response {
    let mut response = denial.envelope().into_response();
    if let Some(secs) = denial.retry_after_secs() {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// `RateLimit-*` headers (IETF draft 6 names).
pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &QuotaHeaders) {
    if let Ok(policy) = HeaderValue::from_str(&format!("{};w={}", quota.limit, quota.window_secs)) {
        headers.insert(RATELIMIT_POLICY, policy);
    }
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(quota.reset_secs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::{LimitScope, Rejection};
    use axum::http::StatusCode;

    #[test]
    fn test_rate_exceeded_sets_retry_after() {
        let response = denial_response(&Denial::RateExceeded(Rejection::new(
            LimitScope::Sensitive,
            Some(840),
        )));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "840");
    }

    #[test]
    fn test_store_unavailable_has_no_retry_after() {
        let response = denial_response(&Denial::StoreUnavailable(LimitScope::Sensitive));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get("retry-after").is_none());
    }

    #[test]
    fn test_quota_headers() {
        let mut headers = HeaderMap::new();
        apply_quota_headers(
            &mut headers,
            &QuotaHeaders {
                limit: 100,
                remaining: 42,
                reset_secs: 600,
                window_secs: 900,
            },
        );
        assert_eq!(headers[RATELIMIT_POLICY], "100;w=900");
        assert_eq!(headers[RATELIMIT_LIMIT], "100");
        assert_eq!(headers[RATELIMIT_REMAINING], "42");
        assert_eq!(headers[RATELIMIT_RESET], "600");
    }
}
