//! Likes, bookmarks and follows.
//!
//! Each toggle is a single insert-or-delete against a pair table whose
//! composite primary key guarantees at most one row per (actor, target).

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use ph_core::error::{PhError, PhResult};
use ph_models::models::engagement::{self, PairTable};
use ph_models::queries::{self, ProverbView};
use ph_models::{Database, NotificationKind, Profile, Proverb};

use crate::auth::AuthUser;
use crate::badge::BadgeService;
use crate::event_bus::{AppEvent, EventBus};
use crate::notification::NotificationService;
use crate::proverb::ProverbPage;
use crate::service::StateCell;
use crate::validate;

/// Outcome of a toggle: whether the pair now exists, and the target's new
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Toggled {
    pub active: bool,
    pub count: i64,
}

fn require_proverb(database: &Database, proverb_id: i64) -> PhResult<Proverb> {
    let conn = database.conn()?;
    Proverb::find_by_id(&conn, proverb_id)?.ok_or_else(|| PhError::not_found("proverb"))
}

pub struct LikeService {
    pub(crate) state: StateCell,
    database: Database,
    event_bus: EventBus,
    notifications: Arc<NotificationService>,
    badges: Arc<BadgeService>,
}

impl LikeService {
    pub fn new(
        database: Database,
        event_bus: EventBus,
        notifications: Arc<NotificationService>,
        badges: Arc<BadgeService>,
    ) -> Self {
        Self {
            state: StateCell::new(),
            database,
            event_bus,
            notifications,
            badges,
        }
    }

    /// Like or unlike a proverb. A new like notifies the author and may earn
    /// them a badge.
    pub fn toggle_like(&self, user: &AuthUser, proverb_id: i64) -> PhResult<Toggled> {
        let proverb = require_proverb(&self.database, proverb_id)?;

        let toggled = {
            let conn = self.database.conn()?;
            let active = engagement::toggle(&conn, PairTable::Likes, user.id, proverb_id)?;
            let count = engagement::count_for_target(&conn, PairTable::Likes, proverb_id)?;
            Toggled { active, count }
        };
        debug!("user {} like on proverb {proverb_id}: {}", user.id, toggled.active);

        self.event_bus.emit(AppEvent::ProverbLiked {
            proverb_id,
            user_id: user.id,
            liked: toggled.active,
        });

        if toggled.active {
            self.notifications.notify(
                proverb.user_id,
                Some(user.id),
                NotificationKind::Like,
                Some(proverb_id),
                None,
            );
            self.badges.check_quietly(proverb.user_id);
        }
        Ok(toggled)
    }
}

crate::impl_simple_service!(LikeService, "likes");

pub struct BookmarkService {
    pub(crate) state: StateCell,
    database: Database,
}

impl BookmarkService {
    pub fn new(database: Database) -> Self {
        Self {
            state: StateCell::new(),
            database,
        }
    }

    pub fn toggle_bookmark(&self, user: &AuthUser, proverb_id: i64) -> PhResult<Toggled> {
        require_proverb(&self.database, proverb_id)?;
        let conn = self.database.conn()?;
        let active = engagement::toggle(&conn, PairTable::Bookmarks, user.id, proverb_id)?;
        let count = engagement::count_for_actor(&conn, PairTable::Bookmarks, user.id)?;
        Ok(Toggled { active, count })
    }

    /// The caller's bookmarks, most recently saved first.
    pub fn list_bookmarks(&self, user: &AuthUser, page: Option<u32>) -> PhResult<ProverbPage> {
        let (page, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        let mut items: Vec<ProverbView> = queries::bookmarked_proverbs(&conn, user.id, limit + 1, offset)?;
        let has_more = items.len() as i64 > limit;
        items.truncate(limit as usize);
        queries::apply_viewer_flags(&conn, user.id, &mut items)?;
        Ok(ProverbPage { items, page, has_more })
    }
}

crate::impl_simple_service!(BookmarkService, "bookmarks");

pub struct FollowService {
    pub(crate) state: StateCell,
    database: Database,
    event_bus: EventBus,
    notifications: Arc<NotificationService>,
    badges: Arc<BadgeService>,
}

impl FollowService {
    pub fn new(
        database: Database,
        event_bus: EventBus,
        notifications: Arc<NotificationService>,
        badges: Arc<BadgeService>,
    ) -> Self {
        Self {
            state: StateCell::new(),
            database,
            event_bus,
            notifications,
            badges,
        }
    }

    /// Follow or unfollow `username`. Following yourself is rejected.
    pub fn toggle_follow(&self, user: &AuthUser, username: &str) -> PhResult<Toggled> {
        let (target_id, toggled) = {
            let conn = self.database.conn()?;
            let target = Profile::find_by_username(&conn, username)?.ok_or_else(|| PhError::not_found("profile"))?;
            if target.id == user.id {
                return Err(PhError::validation("you cannot follow yourself"));
            }
            let active = engagement::toggle(&conn, PairTable::Follows, user.id, target.id)?;
            let count = engagement::count_for_target(&conn, PairTable::Follows, target.id)?;
            (target.id, Toggled { active, count })
        };

        self.event_bus.emit(AppEvent::FollowChanged {
            follower_id: user.id,
            following_id: target_id,
            following: toggled.active,
        });

        if toggled.active {
            self.notifications
                .notify(target_id, Some(user.id), NotificationKind::Follow, None, None);
            self.badges.check_quietly(target_id);
        }
        Ok(toggled)
    }
}

crate::impl_simple_service!(FollowService, "follows");
