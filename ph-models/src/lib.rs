//! Proverb Hub Models - Database schema, models, migrations, and query builders.
//!
//! This crate owns all data persistence: SQLite database initialization,
//! entity models for profiles, proverbs and their engagement rows, versioned
//! migrations, and query builders for feeds, stats and log search.
//!
//! Uniqueness of likes, bookmarks and follows per (user, target) pair is a
//! schema constraint; the models never check for duplicates themselves.

pub mod db;
pub mod schema;
pub mod models;
pub mod queries;
pub mod migrations;

// Re-export key types
pub use db::{Database, DbPool, map_db_err};
pub use models::timestamp_now;
pub use models::profile::{Profile, NewProfile, ProfileUpdate, PublicProfile};
pub use models::session::Session;
pub use models::proverb::{Proverb, NewProverb};
pub use models::comment::{Comment, CommentView};
pub use models::notification::{Notification, NotificationKind};
pub use models::badge::{Badge, BadgeMetric, AwardedBadge};
pub use models::report::{Report, ReportStatus};
pub use models::audit::SecurityEvent;
pub use models::app_log::{AppLog, LogLevel};
