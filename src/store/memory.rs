//! In-process counter store.
//!
//! Counters live in a `DashMap`; each operation holds the key's shard lock
//! for its whole read-modify-write, which gives the same per-key atomicity
//! the Redis scripts give. Limits are only enforced within one process, so
//! this backend is meant for tests and local development.
//!
//! Expired entries are only replaced when their key is used again, so a
//! long-running process needs [`MemoryStore::spawn_sweeper`] to reclaim the
//! keys of clients that never come back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{CounterSnapshot, CounterStore, RollingLimits, StoreError, TakeSnapshot};

#[derive(Debug, Clone)]
enum Entry {
    Counter {
        count: u64,
        expires_at: Instant,
    },
    Rolling {
        /// When each recorded unit was taken, oldest first.
        taken: VecDeque<Instant>,
        expires_at: Instant,
    },
}

impl Entry {
    fn expires_at(&self) -> Instant {
        match self {
            Entry::Counter { expires_at, .. } | Entry::Rolling { expires_at, .. } => *expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at() <= now
    }
}

/// Counter store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    offline: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live (unexpired) key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Live keys starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Number of entries held, expired or not.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired entries every `interval` until the store is closed or
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if store.closed.load(Ordering::Acquire) {
                    break;
                }
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::trace!(purged, remaining = store.entry_count(), "Expired counters purged");
                }
            }
        })
    }

    /// Take the store offline (or bring it back); while offline every call
    /// fails with `StoreError::Unavailable`, like an unreachable server.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store closed".to_string()));
        }
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<CounterSnapshot, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Counter {
                count: 0,
                expires_at: now + window,
            });

        if entry.is_expired(now) {
            *entry = Entry::Counter {
                count: 0,
                expires_at: now + window,
            };
        }

        match &mut *entry {
            Entry::Counter { count, expires_at } => {
                *count += 1;
                Ok(CounterSnapshot {
                    count: *count,
                    ttl: expires_at.saturating_duration_since(now),
                })
            }
            Entry::Rolling { .. } => Err(StoreError::Protocol(format!(
                "key {key} holds a rolling window, not a counter"
            ))),
        }
    }

    async fn count(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();

        match self.entries.get(key).as_deref() {
            Some(Entry::Counter { count, expires_at }) if *expires_at > now => Ok(Some(CounterSnapshot {
                count: *count,
                ttl: expires_at.saturating_duration_since(now),
            })),
            Some(Entry::Rolling { .. }) => Err(StoreError::Protocol(format!(
                "key {key} holds a rolling window, not a counter"
            ))),
            _ => Ok(None),
        }
    }

    async fn take(&self, key: &str, limits: RollingLimits, cost: u64) -> Result<TakeSnapshot, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Rolling {
                taken: VecDeque::new(),
                expires_at: now + limits.window,
            });

        if entry.is_expired(now) {
            *entry = Entry::Rolling {
                taken: VecDeque::new(),
                expires_at: now + limits.window,
            };
        }

        match &mut *entry {
            Entry::Rolling { taken, expires_at } => {
                while taken.front().is_some_and(|&at| at + limits.window <= now) {
                    taken.pop_front();
                }

                let used = taken.len() as u64;
                if used + cost <= limits.capacity {
                    taken.extend(std::iter::repeat(now).take(cost as usize));
                    *expires_at = now + limits.window;
                    return Ok(TakeSnapshot {
                        granted: true,
                        remaining: limits.capacity - used - cost,
                        retry_after: Duration::ZERO,
                    });
                }

                // Room appears once the (used + cost - capacity) oldest units
                // have aged out; a cost above capacity never fits.
                let must_expire = (used + cost).saturating_sub(limits.capacity) as usize;
                let retry_after = match taken.get(must_expire.saturating_sub(1)) {
                    Some(&at) if cost <= limits.capacity => (at + limits.window).saturating_duration_since(now),
                    _ => limits.window,
                };
                Ok(TakeSnapshot {
                    granted: false,
                    remaining: limits.capacity.saturating_sub(used),
                    retry_after,
                })
            }
            Entry::Counter { .. } => Err(StoreError::Protocol(format!(
                "key {key} holds a counter, not a rolling window"
            ))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
