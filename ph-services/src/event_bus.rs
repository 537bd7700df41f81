//! Typed event bus for intra-service communication.
//!
//! Uses tokio broadcast channels to decouple services from one another.
//! Any service can emit events without knowing who is listening, and any
//! number of subscribers can independently consume events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Domain events emitted by the server actions.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A user registered.
    UserSignedUp {
        user_id: i64,
        username: String,
    },
    /// A proverb was published.
    ProverbCreated {
        proverb_id: i64,
        user_id: i64,
    },
    /// A proverb was edited by its author.
    ProverbUpdated {
        proverb_id: i64,
    },
    /// A proverb was deleted by its author or a moderator.
    ProverbDeleted {
        proverb_id: i64,
        by_user_id: i64,
    },
    /// A like was added or removed.
    ProverbLiked {
        proverb_id: i64,
        user_id: i64,
        liked: bool,
    },
    /// A comment was posted.
    CommentCreated {
        comment_id: i64,
        proverb_id: i64,
        user_id: i64,
    },
    /// A follow was added or removed.
    FollowChanged {
        follower_id: i64,
        following_id: i64,
        following: bool,
    },
    /// A user earned a badge.
    BadgeAwarded {
        user_id: i64,
        slug: String,
    },
    /// A proverb was reported.
    ReportFiled {
        report_id: i64,
        proverb_id: i64,
    },
    /// A moderator closed a report.
    ReportResolved {
        report_id: i64,
        status: String,
    },
    /// A user was banned or unbanned.
    UserBanChanged {
        user_id: i64,
        banned: bool,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Slow subscribers that fall behind
/// receive a `Lagged` error and miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Human-readable label for an event (for logging).
pub fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::UserSignedUp { .. } => "UserSignedUp",
        AppEvent::ProverbCreated { .. } => "ProverbCreated",
        AppEvent::ProverbUpdated { .. } => "ProverbUpdated",
        AppEvent::ProverbDeleted { .. } => "ProverbDeleted",
        AppEvent::ProverbLiked { .. } => "ProverbLiked",
        AppEvent::CommentCreated { .. } => "CommentCreated",
        AppEvent::FollowChanged { .. } => "FollowChanged",
        AppEvent::BadgeAwarded { .. } => "BadgeAwarded",
        AppEvent::ReportFiled { .. } => "ReportFiled",
        AppEvent::ReportResolved { .. } => "ReportResolved",
        AppEvent::UserBanChanged { .. } => "UserBanChanged",
    }
}
