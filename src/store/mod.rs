//! Shared counter store subsystem.
//!
//! # Data Flow
//! ```text
//! Limiter (consumption / window)
//!     → CounterStore trait (atomic increment-with-expiry, rolling take, read)
//!     → redis.rs (shared across instances, Lua scripts)
//!     → memory.rs (single process, per-key locked entries)
//! ```
//!
//! # Design Decisions
//! - Atomicity is the store's job; the client never does read-modify-write
//! - Every call has a bounded timeout; a timeout is reported as unavailable
//! - A failed call never yields a fabricated count
//! - Keys are never deleted explicitly; expiry destroys them

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Failure talking to the counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the command.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured deadline.
    #[error("counter store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with something we cannot interpret.
    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}

/// State of a fixed-window counter after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Number of hits recorded in the current window, including this one.
    pub count: u64,
    /// Time until the window (and the key) expires.
    pub ttl: Duration,
}

/// Budget of a rolling window: at most `capacity` units in any span of
/// `window`. A unit becomes available again `window` after it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingLimits {
    pub capacity: u64,
    pub window: Duration,
}

impl RollingLimits {
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis().max(1) as u64
    }
}

/// Result of trying to take units from a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeSnapshot {
    /// Whether the requested units were taken.
    pub granted: bool,
    /// Units still available after the operation.
    pub remaining: u64,
    /// Wait until enough units are back; zero when granted.
    pub retry_after: Duration,
}

/// Atomic counter operations shared by every limiter.
///
/// Implementations must be safe to call from many tasks at once and must
/// serialize operations on the same key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` by one and return the new count and remaining TTL.
    ///
    /// The expiry is set to `window` only when the key is created.
    async fn increment(&self, key: &str, window: Duration) -> Result<CounterSnapshot, StoreError>;

    /// Read a counter without touching it. `None` when the key does not exist.
    async fn count(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError>;

    /// Drop the units at `key` older than `limits.window`, then record `cost`
    /// new ones if the window has room for them.
    ///
    /// A refused take records nothing.
    async fn take(&self, key: &str, limits: RollingLimits, cost: u64) -> Result<TakeSnapshot, StoreError>;

    /// Check the store answers.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the connection at shutdown.
    async fn close(&self) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Round a duration up to whole seconds, as used by `Retry-After`.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ms_is_never_zero() {
        assert_eq!(RollingLimits::new(10, Duration::from_secs(1)).window_ms(), 1000);
        assert_eq!(RollingLimits::new(10, Duration::ZERO).window_ms(), 1);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::ZERO), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(2)), 2);
        assert_eq!(ceil_secs(Duration::from_millis(2001)), 3);
    }
}
