//! Sensitive-scope window limiter.
//!
//! Fixed-window quota per client for requests inside a route scope. The
//! window opens with the client's first request and closes when the store
//! expires the counter, so windows are not aligned across clients.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::{namespaced_key, ClientIdentity, LimitError, LimitScope, Rejection, RouteScope};
use crate::config::WindowLimitConfig;
use crate::store::{ceil_secs, CounterStore};

/// Quota state after an admitted request, used for `RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the window closes.
    pub reset_secs: u64,
}

/// Fixed-window limiter for one route scope.
pub struct WindowLimiter {
    store: Arc<dyn CounterStore>,
    scope: RouteScope,
    window: Duration,
    max: u64,
    key_prefix: String,
}

impl WindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &WindowLimitConfig) -> Self {
        Self {
            store,
            scope: RouteScope::new(config.scope.clone()),
            window: config.window(),
            max: config.max,
            key_prefix: config.key_prefix.clone(),
        }
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether requests to `path` are subject to this limiter.
    pub fn applies_to(&self, path: &str) -> bool {
        self.scope.matches(path)
    }

    /// Store key holding `identity`'s counter.
    pub fn key_for(&self, identity: &ClientIdentity) -> String {
        namespaced_key(&self.key_prefix, identity)
    }

    /// Count one request against the client's window.
    ///
    /// Callers must only invoke this for paths where [`applies_to`] holds.
    /// The hit is recorded even when it is refused.
    ///
    /// [`applies_to`]: WindowLimiter::applies_to
    pub async fn try_admit(&self, identity: &ClientIdentity, path: &str) -> Result<WindowStatus, LimitError> {
        debug_assert!(self.applies_to(path), "window limiter consulted outside its scope");
        let key = self.key_for(identity);

        let snapshot = self
            .store
            .increment(&key, self.window)
            .await
            .map_err(|source| LimitError::StoreUnavailable {
                scope: LimitScope::Sensitive,
                source,
            })?;

        let reset_secs = ceil_secs(snapshot.ttl).max(1);
        trace!(
            key = %key,
            path = %path,
            count = snapshot.count,
            reset_secs,
            "Window checked"
        );

        if snapshot.count > self.max {
            return Err(LimitError::RateExceeded(Rejection::new(
                LimitScope::Sensitive,
                Some(reset_secs),
            )));
        }

        Ok(WindowStatus {
            limit: self.max,
            remaining: self.max - snapshot.count,
            reset_secs,
        })
    }
}
