//! Integration tests for the cache shim and the rate limiter, including
//! their behaviour when the backing store is down.

mod common;

use std::sync::Arc;

use common::FailingStore;
use ph_core::error::PhError;
use ph_models::queries::FeedFilter;
use ph_services::cache::{keys, CacheService, CacheTtl};
use ph_services::rate_limit::{Limiter, RateLimiter};
use ph_services::registry::HealthStatus;
use ph_services::store::MemoryStore;

// ---- Cache keys ----

#[test]
fn profile_key_ignores_username_case() {
    for name in ["Kwame", "KWAME", "kwame", "kWaMe"] {
        assert_eq!(keys::profile(name), keys::profile(&name.to_lowercase()));
    }
    assert_eq!(keys::profile("Kwame"), "profile:kwame");
}

#[test]
fn feed_keys_are_distinct_per_page_and_filter() {
    let mut seen = std::collections::HashSet::new();
    for filter in ["latest", "popular", "following"] {
        for page in 1..=20 {
            assert!(seen.insert(keys::feed(page, filter)), "duplicate key for {filter}/{page}");
            assert_eq!(keys::feed(page, filter), keys::feed(page, filter));
        }
    }
    assert_eq!(keys::feed(3, "latest"), "feed:latest:page:3");
}

// ---- Cache get/set ----

#[tokio::test]
async fn get_on_unset_key_is_a_miss() {
    let cache = CacheService::new(Arc::new(MemoryStore::new("test")));
    let value: Option<String> = cache.get("profile:nobody").await;
    assert!(value.is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn store_outage_looks_like_a_cold_cache() {
    let cache = CacheService::new(Arc::new(FailingStore));

    let value: Option<String> = cache.get("profile:kwame").await;
    assert!(value.is_none());
    assert!(!cache.set("profile:kwame", &"x", CacheTtl::Profile).await);
    assert!(!cache.delete("profile:kwame").await);

    let computed = cache
        .remember("leaderboard:10", CacheTtl::Leaderboard, || async { Ok(vec![1, 2, 3]) })
        .await
        .unwrap();
    assert_eq!(computed, vec![1, 2, 3]);
    assert!(cache.stats().errors >= 3);
}

#[tokio::test]
async fn shared_feed_stays_cached_until_expiry() {
    let (registry, _dir) = common::create_test_registry();
    let author = common::sign_up(&registry, "kwame");
    common::publish(&registry, &author, "Wisdom is like a baobab tree");

    let first = registry.proverbs.feed(None, 1, FeedFilter::Latest).await.unwrap();
    assert_eq!(first.items.len(), 1);

    common::publish(&registry, &author, "When the music changes, so does the dance");
    let second = registry.proverbs.feed(None, 1, FeedFilter::Latest).await.unwrap();
    assert_eq!(second.items.len(), 1, "writes do not clear cached feed pages");

    // A different filter is cached separately
    let popular = registry.proverbs.feed(None, 1, FeedFilter::Popular).await.unwrap();
    assert_eq!(popular.items.len(), 2);
}

#[tokio::test]
async fn cached_feed_carries_viewer_flags() {
    let (registry, _dir) = common::create_test_registry();
    let author = common::sign_up(&registry, "kwame");
    let reader = common::sign_up(&registry, "ama");
    let id = common::publish(&registry, &author, "Rain does not fall on one roof alone");

    // Warm the cache anonymously, then read as someone who liked it
    registry.proverbs.feed(None, 1, FeedFilter::Latest).await.unwrap();
    registry.likes.toggle_like(&reader, id).unwrap();

    let page = registry.proverbs.feed(Some(&reader), 1, FeedFilter::Latest).await.unwrap();
    assert!(page.items[0].liked);
    let page = registry.proverbs.feed(Some(&author), 1, FeedFilter::Latest).await.unwrap();
    assert!(!page.items[0].liked);
}

#[tokio::test]
async fn following_feed_needs_a_viewer() {
    let (registry, _dir) = common::create_test_registry();
    let err = registry.proverbs.feed(None, 1, FeedFilter::Following).await.unwrap_err();
    assert!(matches!(err, PhError::Authentication(_)));

    let author = common::sign_up(&registry, "kwame");
    let reader = common::sign_up(&registry, "ama");
    common::publish(&registry, &author, "One who asks questions never loses the way");

    let empty = registry.proverbs.feed(Some(&reader), 1, FeedFilter::Following).await.unwrap();
    assert!(empty.items.is_empty());

    registry.follows.toggle_follow(&reader, "kwame").unwrap();
    let page = registry.proverbs.feed(Some(&reader), 1, FeedFilter::Following).await.unwrap();
    assert_eq!(page.items.len(), 1);
}

// ---- Rate limiter ----

#[tokio::test]
async fn sixth_login_attempt_is_denied() {
    let limiter = RateLimiter::new(Arc::new(MemoryStore::new("test")), true);
    for attempt in 1..=5 {
        let result = limiter.check_rate_limit("ip:10.0.0.1", Limiter::Login).await;
        assert!(result.success, "attempt {attempt} should pass");
        assert_eq!(result.limit, 5);
    }
    let sixth = limiter.check_rate_limit("ip:10.0.0.1", Limiter::Login).await;
    assert!(!sixth.success);
    assert_eq!(sixth.remaining, 0);
    assert!(sixth.reset > chrono::Utc::now().timestamp_millis());

    // Other identifiers are unaffected
    assert!(limiter.check_rate_limit("ip:10.0.0.2", Limiter::Login).await.success);
}

#[tokio::test]
async fn limiter_fails_open_when_store_is_down() {
    let limiter = RateLimiter::new(Arc::new(FailingStore), true);
    assert!(limiter.check("ip:10.0.0.1", Limiter::Login).await.is_err());

    for _ in 0..10 {
        let result = limiter.check_rate_limit("ip:10.0.0.1", Limiter::Login).await;
        assert!(result.success);
    }
    assert!(limiter.enforce("user:1", Limiter::Api).await.is_ok());
}

#[tokio::test]
async fn sign_in_is_limited_per_email() {
    let (registry, _dir) = common::create_test_registry();
    common::sign_up(&registry, "kwame");

    for _ in 0..5 {
        let err = registry
            .auth
            .sign_in("kwame@example.com", "wrong-password", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PhError::Authentication(_)));
    }

    // Even the right password is refused once the window is exhausted
    let err = registry
        .auth
        .sign_in("kwame@example.com", common::PASSWORD, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PhError::RateLimited { limit: 5, .. }));
}

#[tokio::test]
async fn peeking_leaves_the_login_budget_alone() {
    let (registry, _dir) = common::create_test_registry();
    common::sign_up(&registry, "kwame");

    for _ in 0..8 {
        let ip = registry.limiter.peek_rate_limit("ip:203.0.113.9", Limiter::Login).await;
        let email = registry.limiter.peek_rate_limit("email:kwame@example.com", Limiter::Login).await;
        assert!(ip.success && email.success);
        assert_eq!(ip.remaining, 5);
    }

    registry
        .auth
        .sign_in("kwame@example.com", common::PASSWORD, Some("203.0.113.9"))
        .await
        .unwrap();
    let after = registry.limiter.peek_rate_limit("ip:203.0.113.9", Limiter::Login).await;
    assert_eq!(after.remaining, 4);
}

#[tokio::test]
async fn profile_updates_are_limited_per_user() {
    let (registry, _dir) = common::create_test_registry();
    let user = common::sign_up(&registry, "kwame");
    let update = ph_models::ProfileUpdate {
        bio: Some("Collector of sayings".into()),
        ..Default::default()
    };

    for _ in 0..10 {
        registry.profiles.update_profile(&user, &update).await.unwrap();
    }
    let err = registry.profiles.update_profile(&user, &update).await.unwrap_err();
    assert_eq!(err.status_code(), 429);
}

// ---- Health ----

#[tokio::test]
async fn store_outage_degrades_health() {
    let (registry, _dir) = common::create_test_registry_with_store(Arc::new(FailingStore));
    let health = registry.health_check().await;
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.http_status(), 200);
    assert!(health.database.healthy);
    assert!(!health.cache.healthy);

    // Reads keep working without the cache
    let author = common::sign_up(&registry, "kwame");
    common::publish(&registry, &author, "The sun never sets without fresh news");
    let page = registry.proverbs.feed(None, 1, FeedFilter::Latest).await.unwrap();
    assert_eq!(page.items.len(), 1);
}
