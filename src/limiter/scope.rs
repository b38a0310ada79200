//! Route scope matching for the sensitive limiter.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Matching is per segment: "/api/v1" covers "/api/v1" and "/api/v1/x",
//!   never "/api/v10"
//! - "/" (or an empty prefix) covers every path
//! - No regex to guarantee O(n) matching

/// A path prefix compiled once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteScope {
    /// Normalized prefix without trailing slashes; empty means "everything".
    prefix: String,
}

impl RouteScope {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Returns true if `path` falls inside this scope.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
