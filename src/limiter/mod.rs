//! Admission limiters.
//!
//! # Data Flow
//! ```text
//! ClientIdentity
//!     → consumption.rs (rolling window, every request, "global" scope)
//!     → scope.rs (is the path inside the sensitive prefix?)
//!     → window.rs (fixed window, sensitive requests only)
//!     → Ok(status) | Err(LimitError)
//! ```
//!
//! # Design Decisions
//! - Limiters hold no per-client state; everything lives in the counter store
//! - Throttling and store failure are distinct errors; the pipeline owns the
//!   failure policy
//! - Budgets are fixed at construction

pub mod consumption;
pub mod scope;
pub mod window;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub use consumption::ConsumptionLimiter;
pub use scope::RouteScope;
pub use window::{WindowLimiter, WindowStatus};

/// Which limiter produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitScope {
    Global,
    Sensitive,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Global => "global",
            LimitScope::Sensitive => "sensitive",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was denied by a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: &'static str,
    pub scope: LimitScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl Rejection {
    pub const REASON: &'static str = "rate_exceeded";

    pub fn new(scope: LimitScope, retry_after_secs: Option<u64>) -> Self {
        Self {
            reason: Self::REASON,
            scope,
            retry_after_secs,
        }
    }
}

/// Failure of a limiter check.
#[derive(Debug, Error)]
pub enum LimitError {
    #[error("rate exceeded ({} scope)", .0.scope)]
    RateExceeded(Rejection),

    #[error("{scope} limiter could not reach the counter store: {source}")]
    StoreUnavailable {
        scope: LimitScope,
        #[source]
        source: StoreError,
    },
}

impl LimitError {
    pub fn scope(&self) -> LimitScope {
        match self {
            LimitError::RateExceeded(rejection) => rejection.scope,
            LimitError::StoreUnavailable { scope, .. } => *scope,
        }
    }
}

/// Partition key for both limiters, derived from the peer address.
///
/// The empty string is a valid (shared) identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The shared key used when no address is available.
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key namespace for a configured prefix: the prefix with a trailing ':'.
///
/// A prefix that already ends in ':' is used as is.
pub(crate) fn namespace(prefix: &str) -> String {
    if prefix.ends_with(':') {
        prefix.to_string()
    } else {
        format!("{prefix}:")
    }
}

/// Store key for `identity` inside a limiter namespace.
pub(crate) fn namespaced_key(prefix: &str, identity: &ClientIdentity) -> String {
    format!("{}{identity}", namespace(prefix))
}
