//! Global consumption limiter.
//!
//! A rolling window per client: at most `points` units in any span of
//! `duration`. Capacity comes back unit by unit, each one exactly `duration`
//! after it was used, so there is no hard reset at a window boundary and a
//! burst of `points` is followed by a gradual refill.

use std::sync::Arc;

use tracing::trace;

use super::{namespaced_key, ClientIdentity, LimitError, LimitScope, Rejection};
use crate::config::ConsumptionLimitConfig;
use crate::store::{ceil_secs, CounterStore, RollingLimits};

/// Rolling-window limiter consulted on every request.
pub struct ConsumptionLimiter {
    store: Arc<dyn CounterStore>,
    limits: RollingLimits,
    key_prefix: String,
}

impl ConsumptionLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &ConsumptionLimitConfig) -> Self {
        Self {
            store,
            limits: RollingLimits::new(config.points, config.duration()),
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// Store key holding `identity`'s window.
    pub fn key_for(&self, identity: &ClientIdentity) -> String {
        namespaced_key(&self.key_prefix, identity)
    }

    /// Take `cost` units from the client's window.
    ///
    /// Returns the units left on success. A refused request takes nothing.
    pub async fn try_consume(&self, identity: &ClientIdentity, cost: u64) -> Result<u64, LimitError> {
        let key = self.key_for(identity);

        let snapshot = self
            .store
            .take(&key, self.limits, cost)
            .await
            .map_err(|source| LimitError::StoreUnavailable {
                scope: LimitScope::Global,
                source,
            })?;

        trace!(
            key = %key,
            granted = snapshot.granted,
            remaining = snapshot.remaining,
            "Consumption checked"
        );

        if snapshot.granted {
            Ok(snapshot.remaining)
        } else {
            let retry_after = ceil_secs(snapshot.retry_after).max(1);
            Err(LimitError::RateExceeded(Rejection::new(
                LimitScope::Global,
                Some(retry_after),
            )))
        }
    }
}
