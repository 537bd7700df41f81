//! In-app notifications.
//!
//! `notify` is called from other server actions after their primary write has
//! succeeded; it skips self-notifications and swallows its own failures.

use tracing::{debug, warn};

use ph_core::constants::DEFAULT_PAGE_SIZE;
use ph_core::error::{PhError, PhResult};
use ph_models::{Database, Notification, NotificationKind};

use crate::auth::AuthUser;
use crate::service::StateCell;

pub struct NotificationService {
    pub(crate) state: StateCell,
    database: Database,
}

impl NotificationService {
    pub fn new(database: Database) -> Self {
        Self {
            state: StateCell::new(),
            database,
        }
    }

    /// Notify `recipient` that `actor` did something. No-op when they are the
    /// same user.
    pub fn notify(
        &self,
        recipient: i64,
        actor: Option<i64>,
        kind: NotificationKind,
        proverb_id: Option<i64>,
        message: Option<&str>,
    ) {
        if actor == Some(recipient) {
            debug!("skipping self-notification ({kind})");
            return;
        }

        let result = self
            .database
            .conn()
            .and_then(|conn| Notification::create(&conn, recipient, actor, kind, proverb_id, message));
        if let Err(e) = result {
            warn!("failed to create {kind} notification for user {recipient}: {e}");
        }
    }

    pub fn list(&self, user: &AuthUser, unread_only: bool, page: u32) -> PhResult<Vec<Notification>> {
        let limit = DEFAULT_PAGE_SIZE;
        let offset = (page.max(1) as i64 - 1) * limit;
        let conn = self.database.conn()?;
        Notification::list_for_user(&conn, user.id, unread_only, limit, offset)
    }

    pub fn unread_count(&self, user: &AuthUser) -> PhResult<i64> {
        let conn = self.database.conn()?;
        Notification::unread_count(&conn, user.id)
    }

    /// Mark one of the caller's notifications read.
    pub fn mark_read(&self, user: &AuthUser, notification_id: i64) -> PhResult<()> {
        let conn = self.database.conn()?;
        if !Notification::mark_read(&conn, notification_id, user.id)? {
            return Err(PhError::not_found("notification"));
        }
        Ok(())
    }

    pub fn mark_all_read(&self, user: &AuthUser) -> PhResult<usize> {
        let conn = self.database.conn()?;
        Notification::mark_all_read(&conn, user.id)
    }
}

crate::impl_simple_service!(NotificationService, "notifications");
