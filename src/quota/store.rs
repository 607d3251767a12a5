//! Counter store backends for the quota tracker.
//!
//! The tracker holds no state of its own; every counter lives in a shared
//! key-value store behind the [`CounterStore`] trait. The production backend
//! is Redis ([`RedisCounterStore`]); [`MemoryCounterStore`] is an in-process
//! fake with the same contract for tests.
//!
//! Correctness leans on the store's atomicity: `incr_by` must be a single
//! read-modify-write (Redis `INCRBY`), and `conditional_incr` must run the
//! compare and the increment as one atomic unit (a Lua script here), so
//! concurrent callers against the same key never lose updates.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::debug;

use crate::error::{Result, SavvyError};

/// Outcome of a conditional increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CondIncr {
    /// Whether the increment was applied.
    pub applied: bool,
    /// Counter value observed by the store: the new value when applied, the
    /// unchanged current value when denied.
    pub value: u64,
}

/// A shared key-value store of non-negative counters with absolute expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter. A key that has never been written reads as `None`.
    async fn get(&self, key: &str) -> Result<Option<u64>>;

    /// Atomically add `amount` to the counter (implicitly created at zero)
    /// and set its absolute expiry. Returns the new value, floored at zero.
    async fn incr_by(&self, key: &str, amount: i64, expire_at_unix: i64) -> Result<u64>;

    /// Atomically add `amount` only if `current + amount <= limit`, setting
    /// the expiry when the increment is applied. A denied call leaves both
    /// the counter and its expiry untouched.
    async fn conditional_incr(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expire_at_unix: i64,
    ) -> Result<CondIncr>;
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

/// Compare-and-increment run atomically inside Redis. Returns
/// `{applied, value}` where `value` is the new counter when applied and the
/// unchanged current counter when denied.
const RESERVE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local amount = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
if current + amount > limit then
    return {0, current}
end
local value = redis.call('INCRBY', KEYS[1], amount)
redis.call('EXPIREAT', KEYS[1], ARGV[3])
return {1, value}
"#;

/// Counter store backed by a shared Redis instance.
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    reserve_script: Script,
}

impl RedisCounterStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SavvyError::Config(format!("Invalid Redis URL '{}': {}", url, e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SavvyError::Store(format!("Redis connection failed: {}", e)))?;
        debug!("Connected to counter store at {}", url);
        Ok(Self {
            conn,
            reserve_script: Script::new(RESERVE_SCRIPT),
        })
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(key).await?;
        Ok(value)
    }

    async fn incr_by(&self, key: &str, amount: i64, expire_at_unix: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        // MULTI/EXEC so the expiry always lands together with the increment.
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, amount)
            .expire_at(key, expire_at_unix)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(value.max(0) as u64)
    }

    async fn conditional_incr(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expire_at_unix: i64,
    ) -> Result<CondIncr> {
        let mut conn = self.conn.clone();
        let (applied, value): (i64, i64) = self
            .reserve_script
            .key(key)
            .arg(amount)
            .arg(limit)
            .arg(expire_at_unix)
            .invoke_async(&mut conn)
            .await?;
        Ok(CondIncr {
            applied: applied == 1,
            value: value.max(0) as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct MemoryCounter {
    value: i64,
    expire_at_unix: i64,
}

/// In-process [`CounterStore`] with the same semantics as the Redis backend.
///
/// Counters are never actually expired (tests that care about rollover
/// exercise the date-suffixed keys instead), but the expiry timestamp of the
/// most recent write is kept and exposed via [`MemoryCounterStore::expiry_of`]
/// so expiry-refresh behavior stays observable.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    state: Mutex<HashMap<String, MemoryCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry timestamp recorded for `key`, if the key exists.
    pub fn expiry_of(&self, key: &str) -> Option<i64> {
        self.state
            .lock()
            .expect("counter state lock poisoned")
            .get(key)
            .map(|c| c.expire_at_unix)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>> {
        let guard = self.state.lock().expect("counter state lock poisoned");
        Ok(guard.get(key).map(|c| c.value.max(0) as u64))
    }

    async fn incr_by(&self, key: &str, amount: i64, expire_at_unix: i64) -> Result<u64> {
        let mut guard = self.state.lock().expect("counter state lock poisoned");
        let entry = guard.entry(key.to_string()).or_insert(MemoryCounter {
            value: 0,
            expire_at_unix,
        });
        entry.value += amount;
        entry.expire_at_unix = expire_at_unix;
        Ok(entry.value.max(0) as u64)
    }

    async fn conditional_incr(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expire_at_unix: i64,
    ) -> Result<CondIncr> {
        let mut guard = self.state.lock().expect("counter state lock poisoned");
        let current = guard.get(key).map(|c| c.value.max(0) as u64).unwrap_or(0);
        if current.saturating_add(amount) > limit {
            return Ok(CondIncr {
                applied: false,
                value: current,
            });
        }
        let entry = guard.entry(key.to_string()).or_insert(MemoryCounter {
            value: 0,
            expire_at_unix,
        });
        entry.value += amount as i64;
        entry.expire_at_unix = expire_at_unix;
        Ok(CondIncr {
            applied: true,
            value: entry.value.max(0) as u64,
        })
    }
}
