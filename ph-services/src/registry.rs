//! Service registry for dependency injection and lifecycle management.
//!
//! The registry wires the key-value store, cache, rate limiter and every
//! server action together, initializes them in dependency order and shuts
//! them down in reverse.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use ph_core::config::AppConfig;
use ph_core::error::{PhError, PhResult};
use ph_models::Database;

use crate::audit::AuditService;
use crate::auth::AuthService;
use crate::badge::BadgeService;
use crate::cache::{CacheService, CacheStats};
use crate::comment::CommentService;
use crate::engagement::{BookmarkService, FollowService, LikeService};
use crate::event_bus::EventBus;
use crate::moderation::ModerationService;
use crate::notification::NotificationService;
use crate::profile::ProfileService;
use crate::proverb::ProverbService;
use crate::rate_limit::RateLimiter;
use crate::service::{Service, ServiceState};
use crate::store::{connect_store, KeyValueStore};

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything answers.
    Ok,
    /// The database is fine but the cache store is not. Caching and rate
    /// limiting fail open, so requests are still served.
    Degraded,
    /// The database is unreachable.
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of [`ServiceRegistry::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub host: String,
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
    pub cache_stats: CacheStats,
    pub services: Vec<ComponentHealth>,
}

impl HealthReport {
    /// HTTP status for the health endpoint.
    pub fn http_status(&self) -> u16 {
        match self.status {
            HealthStatus::Down => 503,
            _ => 200,
        }
    }
}

/// Central service registry that owns every application service.
pub struct ServiceRegistry {
    pub database: Database,
    pub event_bus: EventBus,
    pub store: Arc<dyn KeyValueStore>,
    pub cache: Arc<CacheService>,
    pub limiter: Arc<RateLimiter>,
    pub audit: Arc<AuditService>,
    pub auth: Arc<AuthService>,
    pub notifications: Arc<NotificationService>,
    pub badges: Arc<BadgeService>,
    pub profiles: Arc<ProfileService>,
    pub proverbs: Arc<ProverbService>,
    pub likes: Arc<LikeService>,
    pub bookmarks: Arc<BookmarkService>,
    pub follows: Arc<FollowService>,
    pub comments: Arc<CommentService>,
    pub moderation: Arc<ModerationService>,
    /// Every service in initialization order.
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Connect the key-value store named by the config and build every
    /// service on top of it.
    pub async fn build(config: &AppConfig, database: Database) -> PhResult<Self> {
        let store = connect_store(&config.cache.redis_url, &config.cache.key_prefix).await?;
        Ok(Self::with_store(config, database, store))
    }

    /// Build every service on an already connected store.
    ///
    /// Initialization order:
    /// 1. Cache, rate limiter (store)
    /// 2. Audit, notifications (database)
    /// 3. Badges (notifications)
    /// 4. Auth (limiter, audit)
    /// 5. Profiles, proverbs (cache, badges)
    /// 6. Likes, bookmarks, follows, comments (notifications, badges)
    /// 7. Moderation (auth, audit, notifications)
    pub fn with_store(config: &AppConfig, database: Database, store: Arc<dyn KeyValueStore>) -> Self {
        let bus = EventBus::new(256);

        let cache = Arc::new(CacheService::new(store.clone()));
        let limiter = Arc::new(RateLimiter::new(store.clone(), config.rate_limit.enabled));
        let audit = Arc::new(AuditService::new(database.clone()));
        let notifications = Arc::new(NotificationService::new(database.clone()));
        let badges = Arc::new(BadgeService::new(database.clone(), bus.clone(), notifications.clone()));
        let auth = Arc::new(AuthService::new(
            database.clone(),
            limiter.clone(),
            audit.clone(),
            bus.clone(),
            config.auth.clone(),
        ));
        let profiles = Arc::new(ProfileService::new(
            database.clone(),
            cache.clone(),
            limiter.clone(),
            badges.clone(),
        ));
        let proverbs = Arc::new(ProverbService::new(database.clone(), cache.clone(), bus.clone(), badges.clone()));
        let likes = Arc::new(LikeService::new(database.clone(), bus.clone(), notifications.clone(), badges.clone()));
        let bookmarks = Arc::new(BookmarkService::new(database.clone()));
        let follows = Arc::new(FollowService::new(database.clone(), bus.clone(), notifications.clone(), badges.clone()));
        let comments = Arc::new(CommentService::new(database.clone(), bus.clone(), notifications.clone()));
        let moderation = Arc::new(ModerationService::new(
            database.clone(),
            auth.clone(),
            audit.clone(),
            bus.clone(),
            notifications.clone(),
        ));

        let services: Vec<Arc<dyn Service>> = vec![
            cache.clone(),
            limiter.clone(),
            audit.clone(),
            notifications.clone(),
            badges.clone(),
            auth.clone(),
            profiles.clone(),
            proverbs.clone(),
            likes.clone(),
            bookmarks.clone(),
            follows.clone(),
            comments.clone(),
            moderation.clone(),
        ];
        info!("registered {} services on the {} store", services.len(), store.name());

        Self {
            database,
            event_bus: bus,
            store,
            cache,
            limiter,
            audit,
            auth,
            notifications,
            badges,
            profiles,
            proverbs,
            likes,
            bookmarks,
            follows,
            comments,
            moderation,
            services,
        }
    }

    /// Initialize all services in order.
    pub fn init_all(&self) -> PhResult<()> {
        info!("initializing {} services", self.services.len());
        for service in &self.services {
            if let Err(e) = service.init() {
                error!("failed to initialize service {}: {e}", service.name());
                return Err(PhError::ServiceInit(format!("{}: {e}", service.name())));
            }
        }
        info!("all services initialized");
        Ok(())
    }

    /// Shut down all services in reverse order. Errors are logged and the
    /// remaining services are still stopped.
    pub fn shutdown_all(&self) {
        info!("shutting down services");
        for service in self.services.iter().rev() {
            if let Err(e) = service.shutdown() {
                error!("error shutting down service {}: {e}", service.name());
            }
        }
        info!("all services shut down");
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Ping the database and the store and collect service states.
    pub async fn health_check(&self) -> HealthReport {
        let database = match self.database.ping() {
            Ok(()) => ComponentHealth {
                name: "database".into(),
                healthy: true,
                detail: None,
            },
            Err(e) => {
                error!("health check: database unreachable: {e}");
                ComponentHealth {
                    name: "database".into(),
                    healthy: false,
                    detail: Some(e.to_string()),
                }
            }
        };

        let cache = match self.store.ping().await {
            Ok(()) => ComponentHealth {
                name: self.store.name().into(),
                healthy: true,
                detail: None,
            },
            Err(e) => {
                warn!("health check: {} store unreachable: {e}", self.store.name());
                ComponentHealth {
                    name: self.store.name().into(),
                    healthy: false,
                    detail: Some(e.to_string()),
                }
            }
        };

        let services = self
            .services
            .iter()
            .map(|s| ComponentHealth {
                name: s.name().to_string(),
                healthy: s.is_healthy(),
                detail: (s.state() != ServiceState::Running).then(|| s.state().to_string()),
            })
            .collect();

        let status = if !database.healthy {
            HealthStatus::Down
        } else if !cache.healthy {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        HealthReport {
            status,
            version: ph_core::constants::APP_VERSION.to_string(),
            host: ph_core::Platform::hostname(),
            database,
            cache,
            cache_stats: self.cache.stats(),
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use ph_core::config::DatabaseConfig;

    fn registry(dir: &tempfile::TempDir) -> ServiceRegistry {
        let db = Database::init(&dir.path().join("test.db"), &DatabaseConfig::default()).unwrap();
        ServiceRegistry::with_store(&AppConfig::default(), db, Arc::new(MemoryStore::new("test")))
    }

    #[test]
    fn test_registers_all_services() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = registry(&dir);
        assert_eq!(registry.service_count(), 13);
    }

    #[tokio::test]
    async fn test_init_and_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.init_all().unwrap();

        let health = registry.health_check().await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.http_status(), 200);
        for service in &health.services {
            assert!(service.healthy, "service {} is not healthy", service.name);
        }

        registry.shutdown_all();
        let health = registry.health_check().await;
        assert!(health.services.iter().all(|s| !s.healthy));
    }
}
