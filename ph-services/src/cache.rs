//! Read-through cache over the key-value store.
//!
//! Keys are deterministic strings built by [`keys`]; TTLs come from the fixed
//! per-category policy in [`CacheTtl`]. Every store failure is logged and
//! reported as a miss, so callers always fall through to computing the value
//! and never see a difference between a cold cache and a broken one. There
//! is no invalidation beyond TTL expiry.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use ph_core::constants::cache_ttl;
use ph_core::error::PhResult;

use crate::service::StateCell;
use crate::store::KeyValueStore;

/// Cache key builders.
pub mod keys {
    /// `profile:<username>`, lowercased so lookups are case-insensitive.
    pub fn profile(username: &str) -> String {
        format!("profile:{}", username.to_lowercase())
    }

    /// `feed:<filter>:page:<page>`.
    pub fn feed(page: u32, filter: &str) -> String {
        format!("feed:{filter}:page:{page}")
    }

    pub fn leaderboard(limit: i64) -> String {
        format!("leaderboard:{limit}")
    }

    pub fn user_stats(user_id: i64) -> String {
        format!("user-stats:{user_id}")
    }
}

/// Data categories with a fixed time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    Profile,
    Feed,
    Leaderboard,
    UserStats,
}

impl CacheTtl {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(match self {
            Self::Profile => cache_ttl::PROFILE_SECS,
            Self::Feed => cache_ttl::FEED_SECS,
            Self::Leaderboard => cache_ttl::LEADERBOARD_SECS,
            Self::UserStats => cache_ttl::USER_STATS_SECS,
        })
    }
}

/// Counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} hits, {} misses, {} errors", self.hits, self.misses, self.errors)
    }
}

/// JSON cache over a [`KeyValueStore`].
pub struct CacheService {
    pub(crate) state: StateCell,
    store: Arc<dyn KeyValueStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: StateCell::new(),
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Underlying store, shared with the rate limiter.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Look up a cached value. Missing, failed and undecodable lookups all
    /// return `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache get failed for {key}: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit: {key}");
                Some(value)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!("discarding undecodable cache entry {key}: {e}");
                None
            }
        }
    }

    /// Store a value. Returns false if the write failed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: CacheTtl) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cache set skipped for {key}: {e}");
                return false;
            }
        };

        match self.store.set_ex(key, &raw, ttl.duration()).await {
            Ok(()) => true,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache set failed for {key}: {e}");
                false
            }
        }
    }

    /// Remove a key. Returns false if nothing was removed or the store failed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache delete failed for {key}: {e}");
                false
            }
        }
    }

    /// Return the cached value, or compute it, cache it and return it.
    ///
    /// Only errors from `compute` propagate.
    pub async fn remember<T, F, Fut>(&self, key: &str, ttl: CacheTtl, compute: F) -> PhResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = PhResult<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }
        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

crate::impl_simple_service!(CacheService, "cache");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> CacheService {
        CacheService::new(Arc::new(MemoryStore::new("test")))
    }

    #[test]
    fn test_profile_key_case_insensitive() {
        for name in ["Amara", "AMARA", "amara", "aMaRa"] {
            assert_eq!(keys::profile(name), keys::profile(&name.to_lowercase()));
        }
        assert_eq!(keys::profile("Kofi"), "profile:kofi");
    }

    #[test]
    fn test_feed_keys_distinct() {
        let mut seen = std::collections::HashSet::new();
        for filter in ["latest", "popular"] {
            for page in 1..=20 {
                assert!(seen.insert(keys::feed(page, filter)));
            }
        }
        assert_eq!(keys::feed(2, "latest"), "feed:latest:page:2");
        assert_eq!(keys::feed(2, "latest"), keys::feed(2, "latest"));
    }

    #[test]
    fn test_ttl_policy() {
        assert_eq!(CacheTtl::Profile.duration(), Duration::from_secs(300));
        assert_eq!(CacheTtl::Feed.duration(), Duration::from_secs(60));
        assert_eq!(CacheTtl::Leaderboard.duration(), Duration::from_secs(900));
        assert_eq!(CacheTtl::UserStats.duration(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_get_unset_is_miss() {
        let cache = cache();
        let value: Option<Vec<i64>> = cache.get("nothing-here").await;
        assert!(value.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache();
        assert!(cache.set("k", &vec![1, 2, 3], CacheTtl::Feed).await);
        assert_eq!(cache.get::<Vec<i64>>("k").await, Some(vec![1, 2, 3]));
        assert!(cache.delete("k").await);
        assert_eq!(cache.get::<Vec<i64>>("k").await, None);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_miss() {
        let store = Arc::new(MemoryStore::new("test"));
        store.set_ex("k", "not json", Duration::from_secs(5)).await.unwrap();
        let cache = CacheService::new(store);
        assert_eq!(cache.get::<Vec<i64>>("k").await, None);
    }

    #[tokio::test]
    async fn test_remember_computes_once() {
        let cache = cache();
        let calls = AtomicU64::new(0);
        for _ in 0..3 {
            let v = cache
                .remember("answer", CacheTtl::UserStats, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42_i64)
                })
                .await
                .unwrap();
            assert_eq!(v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
