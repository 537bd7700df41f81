//! Key-value store backing the cache and the rate limiter.
//!
//! `RedisStore` talks to a Redis server through a `ConnectionManager`;
//! `MemoryStore` keeps everything in process and is selected when no redis URL
//! is configured. Both namespace every key with the configured prefix.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::{debug, info};

use ph_core::error::{PhError, PhResult};

/// Minimal command surface needed by the cache and rate limiter.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> PhResult<Option<String>>;

    /// Set with a time-to-live.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> PhResult<()>;

    /// Returns true if a key was removed.
    async fn delete(&self, key: &str) -> PhResult<bool>;

    /// Atomically increment a counter and (re)arm its expiry. Returns the
    /// new value.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> PhResult<i64>;

    /// Decrement a live counter without touching its expiry. Missing keys
    /// and counters at zero are left alone. Returns the resulting value.
    async fn decr(&self, key: &str) -> PhResult<i64>;

    async fn ping(&self) -> PhResult<()>;
}

fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

// ─── Redis ──────────────────────────────────────────────────────────────────

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own after
    /// the initial connection succeeds.
    pub async fn connect(url: &str, prefix: &str) -> PhResult<Self> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(url).map_err(store_err)?;
        let manager = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(store_err)?;

        info!("connected to redis key-value store");
        Ok(Self {
            manager,
            prefix: prefix.to_string(),
        })
    }
}

/// DECR that never creates a key or goes below zero.
const DECR_EXISTING: &str = r"
local value = tonumber(redis.call('GET', KEYS[1]))
if value == nil or value <= 0 then
    return 0
end
return redis.call('DECR', KEYS[1])
";

fn store_err(e: redis::RedisError) -> PhError {
    PhError::Store(e.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> PhResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(namespaced(&self.prefix, key))
            .await
            .map_err(store_err)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> PhResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(namespaced(&self.prefix, key), value, ttl.as_secs().max(1))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> PhResult<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn
            .del(namespaced(&self.prefix, key))
            .await
            .map_err(store_err)?;
        Ok(removed > 0)
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> PhResult<i64> {
        let mut conn = self.manager.clone();
        let key = namespaced(&self.prefix, key);
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(ttl.as_millis() as u64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(value)
    }

    async fn decr(&self, key: &str) -> PhResult<i64> {
        let mut conn = self.manager.clone();
        redis::Script::new(DECR_EXISTING)
            .key(namespaced(&self.prefix, key))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn ping(&self) -> PhResult<()> {
        let mut conn = self.manager.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        debug!("redis ping: {reply}");
        Ok(())
    }
}

// ─── In-process ─────────────────────────────────────────────────────────────

/// Entry count that triggers the first sweep of expired entries.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn live_value(&self, now: Instant) -> Option<&str> {
        (self.expires_at > now).then_some(self.value.as_str())
    }
}

struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    threshold: usize,
    /// Size at which the next insert sweeps expired entries.
    sweep_at: usize,
}

impl MemoryState {
    fn insert(&mut self, key: String, entry: MemoryEntry, now: Instant) {
        self.entries.insert(key, entry);
        if self.entries.len() >= self.sweep_at {
            let before = self.entries.len();
            self.entries.retain(|_, e| e.expires_at > now);
            self.sweep_at = (self.entries.len() * 2).max(self.threshold);
            debug!(
                "memory store sweep dropped {} expired entries, next sweep at {}",
                before - self.entries.len(),
                self.sweep_at
            );
        }
    }
}

/// In-process store with per-entry expiry. Expired entries are dropped on
/// access, and swept in bulk whenever the map outgrows its sweep threshold.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    prefix: String,
}

impl MemoryStore {
    pub fn new(prefix: &str) -> Self {
        Self::with_sweep_threshold(prefix, SWEEP_THRESHOLD)
    }

    pub fn with_sweep_threshold(prefix: &str, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                entries: HashMap::new(),
                threshold,
                sweep_at: threshold,
            })),
            prefix: prefix.to_string(),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state.entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries held in memory, expired ones included.
    pub async fn stored(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Drop all expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, e| e.expires_at > now);
        before - state.entries.len()
    }
}

fn parse_counter(key: &str, value: &str) -> PhResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| PhError::Store(format!("value at {key} is not an integer")))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> PhResult<Option<String>> {
        let key = namespaced(&self.prefix, key);
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.entries.get(&key).map(|e| e.live_value(now).map(str::to_string)) {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                state.entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> PhResult<()> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.insert(
            namespaced(&self.prefix, key),
            MemoryEntry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
            now,
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> PhResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.entries.remove(&namespaced(&self.prefix, key)).is_some())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> PhResult<i64> {
        let key = namespaced(&self.prefix, key);
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let current = match state.entries.get(&key).and_then(|e| e.live_value(now)) {
            Some(value) => parse_counter(&key, value)?,
            None => 0,
        };

        let next = current + 1;
        state.insert(
            key,
            MemoryEntry {
                value: next.to_string(),
                expires_at: now + ttl,
            },
            now,
        );
        Ok(next)
    }

    async fn decr(&self, key: &str) -> PhResult<i64> {
        let key = namespaced(&self.prefix, key);
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let Some(entry) = state.entries.get_mut(&key).filter(|e| e.expires_at > now) else {
            return Ok(0);
        };
        let current = parse_counter(&key, &entry.value)?;
        if current <= 0 {
            return Ok(0);
        }
        entry.value = (current - 1).to_string();
        Ok(current - 1)
    }

    async fn ping(&self) -> PhResult<()> {
        Ok(())
    }
}

/// Build the store selected by configuration: Redis when a URL is set,
/// otherwise the in-process store.
pub async fn connect_store(redis_url: &str, prefix: &str) -> PhResult<Arc<dyn KeyValueStore>> {
    if redis_url.trim().is_empty() {
        info!("no redis url configured, using in-process key-value store");
        return Ok(Arc::new(MemoryStore::new(prefix)));
    }
    Ok(Arc::new(RedisStore::connect(redis_url, prefix).await?))
}
