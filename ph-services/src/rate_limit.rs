//! Named sliding-window rate limiters.
//!
//! The window is approximated from two fixed windows: the count in the
//! current window plus the previous window's count weighted by how much of it
//! still overlaps the trailing interval. Counters live in the key-value store
//! under `ratelimit:<limiter>:<identifier>:<window-index>` and expire after
//! two windows. A denied request is not counted.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ph_core::constants::rate_limits;
use ph_core::error::{PhError, PhResult};

use crate::service::StateCell;
use crate::store::KeyValueStore;

/// The fixed set of limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Limiter {
    Login,
    EmailChange,
    PasswordChange,
    ProfileUpdate,
    Api,
}

impl Limiter {
    pub const ALL: [Limiter; 5] = [
        Limiter::Login,
        Limiter::EmailChange,
        Limiter::PasswordChange,
        Limiter::ProfileUpdate,
        Limiter::Api,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::EmailChange => "email-change",
            Self::PasswordChange => "password-change",
            Self::ProfileUpdate => "profile-update",
            Self::Api => "api",
        }
    }

    fn policy(&self) -> (u32, u64) {
        match self {
            Self::Login => rate_limits::LOGIN,
            Self::EmailChange => rate_limits::EMAIL_CHANGE,
            Self::PasswordChange => rate_limits::PASSWORD_CHANGE,
            Self::ProfileUpdate => rate_limits::PROFILE_UPDATE,
            Self::Api => rate_limits::API,
        }
    }

    /// Maximum requests per window.
    pub fn limit(&self) -> u32 {
        self.policy().0
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.policy().1)
    }
}

impl std::str::FromStr for Limiter {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Limiter::ALL
            .into_iter()
            .find(|l| l.name() == s)
            .ok_or_else(|| PhError::validation(format!("unknown limiter: {s}")))
    }
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds when the current window ends.
    pub reset: i64,
}

impl RateLimitResult {
    fn allowed(limiter: Limiter, now_ms: i64) -> Self {
        let window_ms = limiter.window().as_millis() as i64;
        Self {
            success: true,
            limit: limiter.limit(),
            remaining: limiter.limit(),
            reset: (now_ms / window_ms + 1) * window_ms,
        }
    }

    /// Convert a denial into `PhError::RateLimited`.
    pub fn into_result(self) -> PhResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(PhError::RateLimited {
                limit: self.limit,
                remaining: self.remaining,
                reset: self.reset,
            })
        }
    }
}

pub struct RateLimiter {
    pub(crate) state: StateCell,
    store: Arc<dyn KeyValueStore>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, enabled: bool) -> Self {
        Self {
            state: StateCell::new(),
            store,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check and count one request. Store errors propagate.
    pub async fn check(&self, identifier: &str, limiter: Limiter) -> PhResult<RateLimitResult> {
        self.check_at(identifier, limiter, chrono::Utc::now().timestamp_millis()).await
    }

    /// Same as [`RateLimiter::check`] at an explicit clock reading.
    ///
    /// The counter is incremented first and the decision made from the value
    /// the store returns, so concurrent callers each see a distinct count. A
    /// denied request is rolled back.
    pub async fn check_at(&self, identifier: &str, limiter: Limiter, now_ms: i64) -> PhResult<RateLimitResult> {
        if !self.enabled {
            return Ok(RateLimitResult::allowed(limiter, now_ms));
        }

        let window = WindowPosition::new(limiter, now_ms);
        let current_key = counter_key(limiter, identifier, window.index);
        let ttl = Duration::from_millis((window.window_ms * 2) as u64);

        let counted = self.store.incr_with_expiry(&current_key, ttl).await?;
        let previous = read_counter(self.store.as_ref(), &counter_key(limiter, identifier, window.index - 1)).await?;
        let carried = window.carried(previous);

        // Weight of the requests admitted before this one
        if carried + (counted - 1) as f64 >= limiter.limit() as f64 {
            if let Err(e) = self.store.decr(&current_key).await {
                warn!("failed to roll back {current_key}: {e}");
            }
            debug!("rate limit hit: {} for {identifier}", limiter.name());
            return Ok(window.denied(limiter));
        }

        Ok(window.result(limiter, carried + counted as f64))
    }

    /// Report the limiter state for an identifier without counting a request.
    pub async fn peek(&self, identifier: &str, limiter: Limiter) -> PhResult<RateLimitResult> {
        self.peek_at(identifier, limiter, chrono::Utc::now().timestamp_millis()).await
    }

    /// Same as [`RateLimiter::peek`] at an explicit clock reading. `success`
    /// tells whether the next request would be admitted.
    pub async fn peek_at(&self, identifier: &str, limiter: Limiter, now_ms: i64) -> PhResult<RateLimitResult> {
        if !self.enabled {
            return Ok(RateLimitResult::allowed(limiter, now_ms));
        }

        let window = WindowPosition::new(limiter, now_ms);
        let current = read_counter(self.store.as_ref(), &counter_key(limiter, identifier, window.index)).await?;
        let previous = read_counter(self.store.as_ref(), &counter_key(limiter, identifier, window.index - 1)).await?;
        let used = window.carried(previous) + current as f64;

        if used >= limiter.limit() as f64 {
            return Ok(window.denied(limiter));
        }
        Ok(window.result(limiter, used))
    }

    /// Fail-open [`RateLimiter::peek`].
    pub async fn peek_rate_limit(&self, identifier: &str, limiter: Limiter) -> RateLimitResult {
        let now_ms = chrono::Utc::now().timestamp_millis();
        match self.peek_at(identifier, limiter, now_ms).await {
            Ok(result) => result,
            Err(e) => {
                warn!("rate limiter unavailable for {}, reporting allowed: {e}", limiter.name());
                RateLimitResult::allowed(limiter, now_ms)
            }
        }
    }

    /// Fail-open check: a store failure is logged and treated as allowed.
    pub async fn check_rate_limit(&self, identifier: &str, limiter: Limiter) -> RateLimitResult {
        let now_ms = chrono::Utc::now().timestamp_millis();
        match self.check_at(identifier, limiter, now_ms).await {
            Ok(result) => result,
            Err(e) => {
                warn!("rate limiter unavailable for {}, allowing request: {e}", limiter.name());
                RateLimitResult::allowed(limiter, now_ms)
            }
        }
    }

    /// Fail-open check that turns a denial into `PhError::RateLimited`.
    pub async fn enforce(&self, identifier: &str, limiter: Limiter) -> PhResult<RateLimitResult> {
        self.check_rate_limit(identifier, limiter).await.into_result()
    }
}

crate::impl_simple_service!(RateLimiter, "rate_limiter");

/// Where a clock reading falls relative to a limiter's fixed windows.
struct WindowPosition {
    window_ms: i64,
    index: i64,
    /// Share of the previous window still inside the trailing interval.
    overlap: f64,
}

impl WindowPosition {
    fn new(limiter: Limiter, now_ms: i64) -> Self {
        let window_ms = limiter.window().as_millis() as i64;
        let elapsed = now_ms.rem_euclid(window_ms);
        Self {
            window_ms,
            index: now_ms.div_euclid(window_ms),
            overlap: (window_ms - elapsed) as f64 / window_ms as f64,
        }
    }

    fn carried(&self, previous: i64) -> f64 {
        previous as f64 * self.overlap
    }

    fn reset(&self) -> i64 {
        (self.index + 1) * self.window_ms
    }

    fn denied(&self, limiter: Limiter) -> RateLimitResult {
        RateLimitResult { success: false, limit: limiter.limit(), remaining: 0, reset: self.reset() }
    }

    fn result(&self, limiter: Limiter, used: f64) -> RateLimitResult {
        let limit = limiter.limit();
        RateLimitResult {
            success: true,
            limit,
            remaining: (limit as f64 - used).floor().max(0.0) as u32,
            reset: self.reset(),
        }
    }
}

fn counter_key(limiter: Limiter, identifier: &str, index: i64) -> String {
    format!("ratelimit:{}:{identifier}:{index}", limiter.name())
}

async fn read_counter(store: &dyn KeyValueStore, key: &str) -> PhResult<i64> {
    match store.get(key).await? {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| PhError::Store(format!("counter {key} is not an integer"))),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new("test")), true)
    }

    #[test]
    fn test_policies() {
        assert_eq!((Limiter::Login.limit(), Limiter::Login.window()), (5, Duration::from_secs(900)));
        assert_eq!(Limiter::EmailChange.limit(), 2);
        assert_eq!(Limiter::PasswordChange.limit(), 3);
        assert_eq!(Limiter::ProfileUpdate.window(), Duration::from_secs(60));
        assert_eq!(Limiter::Api.limit(), 100);
        assert_eq!("password-change".parse::<Limiter>().unwrap(), Limiter::PasswordChange);
        assert!("signup".parse::<Limiter>().is_err());
    }

    #[tokio::test]
    async fn test_sixth_login_denied() {
        let rl = limiter();
        // Start of a window so the previous window contributes nothing
        let t0 = 900_000 * 1000;
        for i in 0..5 {
            let r = rl.check_at("1.2.3.4", Limiter::Login, t0 + i * 60_000).await.unwrap();
            assert!(r.success, "attempt {} should pass", i + 1);
            assert_eq!(r.remaining, 4 - i as u32);
        }
        let sixth = rl.check_at("1.2.3.4", Limiter::Login, t0 + 5 * 60_000).await.unwrap();
        assert!(!sixth.success);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.reset, t0 + 900_000);

        // Other identifiers are unaffected
        assert!(rl.check_at("5.6.7.8", Limiter::Login, t0).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_previous_window_weighted() {
        let rl = limiter();
        let window = 60_000;
        let t0 = window * 500;
        for _ in 0..10 {
            assert!(rl.check_at("u1", Limiter::ProfileUpdate, t0).await.unwrap().success);
        }
        // At the start of the next window the previous count applies in full
        let early = rl.check_at("u1", Limiter::ProfileUpdate, t0 + window).await.unwrap();
        assert!(!early.success);

        // Near the end of the next window the old count has mostly decayed
        let late = rl.check_at("u1", Limiter::ProfileUpdate, t0 + 2 * window - 1_000).await.unwrap();
        assert!(late.success);
    }

    #[tokio::test]
    async fn test_denied_requests_not_counted() {
        let rl = limiter();
        let t0 = 3_600_000 * 10;
        assert!(rl.check_at("u", Limiter::EmailChange, t0).await.unwrap().success);
        assert!(rl.check_at("u", Limiter::EmailChange, t0).await.unwrap().success);
        for _ in 0..5 {
            assert!(!rl.check_at("u", Limiter::EmailChange, t0).await.unwrap().success);
        }
        let current: Option<String> = rl.store.get(&counter_key(Limiter::EmailChange, "u", 10)).await.unwrap();
        assert_eq!(current.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        let rl = limiter();
        let t0 = 900_000 * 2000;
        for _ in 0..10 {
            let r = rl.peek_at("ip:10.0.0.1", Limiter::Login, t0).await.unwrap();
            assert!(r.success);
            assert_eq!(r.remaining, 5);
        }
        for _ in 0..5 {
            assert!(rl.check_at("ip:10.0.0.1", Limiter::Login, t0).await.unwrap().success);
        }
        let r = rl.peek_at("ip:10.0.0.1", Limiter::Login, t0).await.unwrap();
        assert!(!r.success);
        assert_eq!(r.remaining, 0);
    }

    #[tokio::test]
    async fn test_concurrent_checks_admit_exactly_the_limit() {
        let rl = Arc::new(limiter());
        let t0 = 900_000 * 3000;
        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let rl = rl.clone();
                tokio::spawn(async move { rl.check_at("ip:10.0.0.2", Limiter::Login, t0).await.unwrap().success })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        let stored = rl.store.get(&counter_key(Limiter::Login, "ip:10.0.0.2", 3000)).await.unwrap();
        assert_eq!(stored.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_disabled_always_allows() {
        let rl = RateLimiter::new(Arc::new(MemoryStore::new("test")), false);
        for _ in 0..20 {
            assert!(rl.check("x", Limiter::EmailChange).await.unwrap().success);
        }
    }

    #[tokio::test]
    async fn test_enforce_maps_denial() {
        let rl = limiter();
        for _ in 0..2 {
            rl.enforce("e", Limiter::EmailChange).await.unwrap();
        }
        let err = rl.enforce("e", Limiter::EmailChange).await.unwrap_err();
        assert!(matches!(err, PhError::RateLimited { limit: 2, remaining: 0, .. }));
    }
}
