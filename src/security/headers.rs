//! Security response headers.
//!
//! # Responsibilities
//! - Add the usual hardening headers to every response, rejections included
//!
//! # Design Decisions
//! - A header already set by a handler is left alone
//! - The set is fixed; it is switched on or off as a whole

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    response::Response,
};

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("content-security-policy", "default-src 'self';base-uri 'self';frame-ancestors 'self';object-src 'none'"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Insert every missing security header into `headers`.
pub fn insert_security_headers(headers: &mut HeaderMap) {
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
}

/// Response mapper for `axum::middleware::map_response`.
pub async fn security_headers(mut response: Response) -> Response {
    insert_security_headers(response.headers_mut());
    response
}
