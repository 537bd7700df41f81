//! Security audit trail and application log persistence.
//!
//! Writes here are observability: a failed insert is logged with `warn!` and
//! never fails the operation that triggered it.

use serde_json::Value;
use tracing::warn;

use ph_core::error::PhResult;
use ph_models::queries::{self, LogPage, LogQuery};
use ph_models::{AppLog, Database, LogLevel, SecurityEvent};

use crate::service::StateCell;

/// Security event names.
pub mod events {
    pub const SIGN_UP: &str = "sign_up";
    pub const SIGN_IN: &str = "sign_in";
    pub const SIGN_IN_FAILED: &str = "sign_in_failed";
    pub const SIGN_OUT: &str = "sign_out";
    pub const EMAIL_CHANGED: &str = "email_changed";
    pub const PASSWORD_CHANGED: &str = "password_changed";
    pub const USER_BANNED: &str = "user_banned";
    pub const USER_UNBANNED: &str = "user_unbanned";
    pub const ROLE_CHANGED: &str = "role_changed";
}

pub struct AuditService {
    pub(crate) state: StateCell,
    database: Database,
}

impl AuditService {
    pub fn new(database: Database) -> Self {
        Self {
            state: StateCell::new(),
            database,
        }
    }

    /// Record a security event. Fire-and-forget.
    pub fn security_event(&self, user_id: Option<i64>, event: &str, ip: Option<&str>, metadata: Option<Value>) {
        let result = self
            .database
            .conn()
            .and_then(|conn| SecurityEvent::record(&conn, user_id, event, ip, metadata.as_ref()));
        if let Err(e) = result {
            warn!("failed to record security event {event}: {e}");
        }
    }

    /// Persist an application log row for the admin viewer. Fire-and-forget.
    pub fn app_log(&self, level: LogLevel, message: &str, context: Option<Value>, user_id: Option<i64>) {
        let result = self
            .database
            .conn()
            .and_then(|conn| AppLog::insert(&conn, level, message, context.as_ref(), user_id));
        if let Err(e) = result {
            warn!("failed to persist application log: {e}");
        }
    }

    /// Paged, filtered log search.
    pub fn query_logs(&self, query: &LogQuery) -> PhResult<LogPage> {
        let conn = self.database.conn()?;
        queries::query_logs(&conn, query)
    }

    pub fn security_events_for(&self, user_id: i64, limit: i64) -> PhResult<Vec<SecurityEvent>> {
        let conn = self.database.conn()?;
        SecurityEvent::list_for_user(&conn, user_id, limit)
    }

    /// Delete log rows older than `days`.
    pub fn prune_logs(&self, days: i64) -> PhResult<usize> {
        let cutoff = ph_models::models::format_timestamp(chrono::Utc::now() - chrono::Duration::days(days));
        let conn = self.database.conn()?;
        AppLog::prune_before(&conn, &cutoff)
    }
}

crate::impl_simple_service!(AuditService, "audit");

#[cfg(test)]
mod tests {
    use super::*;
    use ph_core::config::DatabaseConfig;
    use tempfile::TempDir;

    fn setup() -> (AuditService, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::init(&dir.path().join("t.db"), &DatabaseConfig::default()).unwrap();
        (AuditService::new(db), dir)
    }

    #[test]
    fn test_app_log_and_query() {
        let (audit, _dir) = setup();
        audit.app_log(LogLevel::Error, "cache outage", Some(serde_json::json!({"store": "redis"})), None);
        audit.app_log(LogLevel::Info, "server started", None, None);

        let page = audit.query_logs(&LogQuery { level: Some(LogLevel::Error), ..Default::default() }).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.logs[0].message, "cache outage");
        assert_eq!(page.total_pages, 1);
        assert_eq!(audit.prune_logs(1).unwrap(), 0);
    }

    #[test]
    fn test_security_event_without_user() {
        let (audit, _dir) = setup();
        audit.security_event(None, events::SIGN_IN_FAILED, Some("127.0.0.1"), None);
        // Unknown user ids violate the foreign key; the failure is swallowed
        audit.security_event(Some(999), events::SIGN_IN, None, None);
    }
}
