//! Redis-backed counter store.
//!
//! # Responsibilities
//! - Hold the process-wide connection (opened at startup, closed at shutdown)
//! - Run fixed-window increments and rolling-window takes as Lua scripts so
//!   each is one atomic server-side operation
//! - Bound every call with a timeout
//!
//! # Design Decisions
//! - `ConnectionManager` reconnects in the background; a call made while
//!   disconnected fails fast and is reported as unavailable
//! - Rolling-window ageing uses the Redis clock (`TIME`), so instances with
//!   skewed clocks see the same window

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError, RedisResult, Script};
use async_trait::async_trait;
use tracing::{info, trace};

use super::{CounterSnapshot, CounterStore, RollingLimits, StoreError, TakeSnapshot};
use crate::config::StoreConfig;

/// INCR, and set the expiry when the key is new (or lost its TTL).
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if count == 1 or ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Rolling window kept as a list of take times (ms, oldest first). Drops the
/// entries older than ARGV[2], then appends ARGV[3] entries if they fit.
/// Returns {granted, units left, wait in ms}.
const ROLLING_WINDOW_SCRIPT: &str = r#"
local capacity = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])

local clock = redis.call('TIME')
local now = tonumber(clock[1]) * 1000 + math.floor(tonumber(clock[2]) / 1000)

while true do
  local oldest = redis.call('LINDEX', KEYS[1], 0)
  if not oldest or tonumber(oldest) + window > now then
    break
  end
  redis.call('LPOP', KEYS[1])
end

local used = redis.call('LLEN', KEYS[1])
if used + cost <= capacity then
  for _ = 1, cost do
    redis.call('RPUSH', KEYS[1], now)
  end
  redis.call('PEXPIRE', KEYS[1], window)
  return {1, capacity - used - cost, 0}
end

local wait = window
if cost <= capacity then
  local at = tonumber(redis.call('LINDEX', KEYS[1], used + cost - capacity - 1))
  wait = math.max(1, at + window - now)
end
return {0, math.max(0, capacity - used), wait}
"#;

/// Counter store shared by every instance through one Redis server.
pub struct RedisStore {
    conn: ConnectionManager,
    fixed_window: Script,
    rolling_window: Script,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl RedisStore {
    /// Open the connection. Fails if the server cannot be reached in time.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        info!(url = %sanitize_url(&config.url), "Connecting to Redis counter store");

        let client = Client::open(config.url.as_str()).map_err(map_redis_error)?;
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(map_redis_error)?;

        info!("Redis counter store connected");
        Ok(Self {
            conn,
            fixed_window: Script::new(FIXED_WINDOW_SCRIPT),
            rolling_window: Script::new(ROLLING_WINDOW_SCRIPT),
            call_timeout: Duration::from_millis(config.timeout_ms),
            closed: AtomicBool::new(false),
        })
    }

    /// Run one store call under the configured deadline.
    async fn guarded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(map_redis_error),
            Err(_) => Err(StoreError::Timeout(self.call_timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<CounterSnapshot, StoreError> {
        let mut conn = self.conn.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let (count, ttl_ms): (i64, i64) = self
            .guarded(async {
                self.fixed_window
                    .key(key)
                    .arg(window_ms)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        trace!(key = %key, count, ttl_ms, "Counter incremented");
        Ok(CounterSnapshot {
            count: non_negative(count, "count")?,
            ttl: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn count(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
        let mut conn = self.conn.clone();

        let (count, ttl_ms): (Option<i64>, i64) = self
            .guarded(async {
                ::redis::pipe()
                    .atomic()
                    .cmd("GET")
                    .arg(key)
                    .cmd("PTTL")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        match count {
            Some(count) => Ok(Some(CounterSnapshot {
                count: non_negative(count, "count")?,
                ttl: Duration::from_millis(ttl_ms.max(0) as u64),
            })),
            None => Ok(None),
        }
    }

    async fn take(&self, key: &str, limits: RollingLimits, cost: u64) -> Result<TakeSnapshot, StoreError> {
        let mut conn = self.conn.clone();

        let (granted, remaining, wait_ms): (i64, i64, i64) = self
            .guarded(async {
                self.rolling_window
                    .key(key)
                    .arg(limits.capacity)
                    .arg(limits.window_ms())
                    .arg(cost)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        Ok(TakeSnapshot {
            granted: granted == 1,
            remaining: non_negative(remaining, "remaining")?,
            retry_after: Duration::from_millis(wait_ms.max(0) as u64),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .guarded(async { ::redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        info!("Redis counter store closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Unavailable(format!("timed out: {err}"))
    } else if err.kind() == ::redis::ErrorKind::TypeError {
        StoreError::Protocol(err.to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

fn non_negative(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Protocol(format!("negative {field}: {value}")))
}

/// Hide the password when logging a Redis URL.
pub(crate) fn sanitize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid_url".to_string(),
    }
}
