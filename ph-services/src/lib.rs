//! Proverb Hub Services - server actions and the infrastructure under them.
//!
//! This crate provides:
//! - Key-value store abstraction (Redis or in-process)
//! - Read-through cache with per-category TTLs
//! - Named sliding-window rate limiters
//! - Authentication, sessions and credential changes
//! - Profiles, proverbs, likes, bookmarks, follows and comments
//! - Notifications and badge awards
//! - Moderation (reports, bans, roles) and audit logging
//! - Event bus and the service registry

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod store;
pub mod cache;
pub mod rate_limit;
pub mod password;
pub mod validate;
pub mod audit;
pub mod auth;
pub mod notification;
pub mod badge;
pub mod profile;
pub mod proverb;
pub mod engagement;
pub mod comment;
pub mod moderation;

// Re-export key types
pub use service::{Service, ServiceState};
pub use registry::{HealthReport, HealthStatus, ServiceRegistry};
pub use event_bus::{AppEvent, EventBus};
pub use store::{connect_store, KeyValueStore, MemoryStore, RedisStore};
pub use cache::{CacheService, CacheTtl};
pub use rate_limit::{Limiter, RateLimitResult, RateLimiter};
pub use audit::AuditService;
pub use auth::{AuthService, AuthUser, IssuedSession};
pub use notification::NotificationService;
pub use badge::BadgeService;
pub use profile::{ProfilePage, ProfileService};
pub use proverb::{ProverbInput, ProverbPage, ProverbService};
pub use engagement::{BookmarkService, FollowService, LikeService, Toggled};
pub use comment::CommentService;
pub use moderation::{ModerationService, ReportAction};
