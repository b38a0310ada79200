//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight and origin checks)
//!     → body limit (tower-http, from SecurityConfig::max_body_size)
//!     → admission (rate limits)
//! Outgoing response:
//!     → headers.rs (hardening headers)
//! ```
//!
//! # Design Decisions
//! - Hardening headers are applied to rejections as well as admitted responses
//! - No trust in client-supplied forwarding headers

pub mod cors;
pub mod headers;

pub use cors::cors_layer;
pub use headers::security_headers;
