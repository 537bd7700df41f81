use std::sync::Arc;

use tracing::info;

use ph_core::constants::validation;
use ph_core::error::{PhError, PhResult};
use ph_models::{Comment, CommentView, Database, NotificationKind, Proverb};

use crate::auth::AuthUser;
use crate::event_bus::{AppEvent, EventBus};
use crate::notification::NotificationService;
use crate::service::StateCell;
use crate::validate;

pub struct CommentService {
    pub(crate) state: StateCell,
    database: Database,
    event_bus: EventBus,
    notifications: Arc<NotificationService>,
}

impl CommentService {
    pub fn new(database: Database, event_bus: EventBus, notifications: Arc<NotificationService>) -> Self {
        Self {
            state: StateCell::new(),
            database,
            event_bus,
            notifications,
        }
    }

    /// Post a comment and notify the proverb's author.
    pub fn create_comment(&self, user: &AuthUser, proverb_id: i64, content: &str) -> PhResult<Comment> {
        let content = validate::text("comment", content, 1, validation::COMMENT_MAX_LEN)?;

        let (comment, owner_id) = {
            let conn = self.database.conn()?;
            let proverb = Proverb::find_by_id(&conn, proverb_id)?.ok_or_else(|| PhError::not_found("proverb"))?;
            (Comment::create(&conn, proverb_id, user.id, &content)?, proverb.user_id)
        };

        self.event_bus.emit(AppEvent::CommentCreated {
            comment_id: comment.id,
            proverb_id,
            user_id: user.id,
        });
        self.notifications.notify(
            owner_id,
            Some(user.id),
            NotificationKind::Comment,
            Some(proverb_id),
            None,
        );
        Ok(comment)
    }

    /// Delete a comment. Allowed for the comment's author, the proverb's
    /// author and admins.
    pub fn delete_comment(&self, user: &AuthUser, comment_id: i64) -> PhResult<()> {
        let conn = self.database.conn()?;
        let comment = Comment::find_by_id(&conn, comment_id)?.ok_or_else(|| PhError::not_found("comment"))?;

        let allowed = comment.user_id == user.id
            || user.is_admin()
            || Proverb::find_by_id(&conn, comment.proverb_id)?.is_some_and(|p| p.user_id == user.id);
        if !allowed {
            return Err(PhError::forbidden("you cannot delete this comment"));
        }

        Comment::delete(&conn, comment_id)?;
        info!("comment {comment_id} deleted by user {}", user.id);
        Ok(())
    }

    /// Comments on a proverb, oldest first.
    pub fn list_comments(&self, proverb_id: i64, page: Option<u32>) -> PhResult<Vec<CommentView>> {
        let (_, limit, offset) = validate::page(page, None);
        let conn = self.database.conn()?;
        if Proverb::find_by_id(&conn, proverb_id)?.is_none() {
            return Err(PhError::not_found("proverb"));
        }
        Comment::list_for_proverb(&conn, proverb_id, limit, offset)
    }
}

crate::impl_simple_service!(CommentService, "comments");
