//! Badge awards.
//!
//! A handful of threshold checks against per-user counters. Callers treat
//! badge failures as non-fatal.

use std::sync::Arc;

use tracing::info;

use ph_core::error::PhResult;
use ph_models::models::engagement::{self, PairTable};
use ph_models::{AwardedBadge, Badge, BadgeMetric, Database, NotificationKind, Proverb};

use crate::event_bus::{AppEvent, EventBus};
use crate::notification::NotificationService;
use crate::service::StateCell;

pub struct BadgeService {
    pub(crate) state: StateCell,
    database: Database,
    event_bus: EventBus,
    notifications: Arc<NotificationService>,
}

impl BadgeService {
    pub fn new(database: Database, event_bus: EventBus, notifications: Arc<NotificationService>) -> Self {
        Self {
            state: StateCell::new(),
            database,
            event_bus,
            notifications,
        }
    }

    /// Award every badge whose threshold the user now meets. Returns only
    /// the badges awarded by this call.
    pub fn check_and_award(&self, user_id: i64) -> PhResult<Vec<Badge>> {
        let conn = self.database.conn()?;

        let proverbs = Proverb::count_by_user(&conn, user_id)?;
        let likes = engagement::likes_received(&conn, user_id)?;
        let followers = engagement::count_for_target(&conn, PairTable::Follows, user_id)?;

        let mut awarded = Vec::new();
        for badge in Badge::all(&conn)? {
            let value = match badge.metric {
                BadgeMetric::Proverbs => proverbs,
                BadgeMetric::LikesReceived => likes,
                BadgeMetric::Followers => followers,
            };
            if value >= badge.threshold && Badge::award(&conn, user_id, badge.id)? {
                info!("user {user_id} earned badge {}", badge.slug);
                awarded.push(badge);
            }
        }
        drop(conn);

        for badge in &awarded {
            self.notifications.notify(
                user_id,
                None,
                NotificationKind::Badge,
                None,
                Some(&format!("You earned the {} badge", badge.name)),
            );
            self.event_bus.emit(AppEvent::BadgeAwarded {
                user_id,
                slug: badge.slug.clone(),
            });
        }

        Ok(awarded)
    }

    /// Run [`BadgeService::check_and_award`], logging instead of failing.
    pub fn check_quietly(&self, user_id: i64) {
        if let Err(e) = self.check_and_award(user_id) {
            tracing::warn!("badge check failed for user {user_id}: {e}");
        }
    }

    pub fn list_for_user(&self, user_id: i64) -> PhResult<Vec<AwardedBadge>> {
        let conn = self.database.conn()?;
        Badge::list_for_user(&conn, user_id)
    }
}

crate::impl_simple_service!(BadgeService, "badges");
