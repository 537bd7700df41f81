//! Notification entity model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use super::timestamp_now;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Badge,
    Moderation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Badge => "badge",
            Self::Moderation => "moderation",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            "badge" => Ok(Self::Badge),
            "moderation" => Ok(Self::Moderation),
            other => Err(PhError::validation(format!("unknown notification kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub actor_username: Option<String>,
    pub kind: NotificationKind,
    pub proverb_id: Option<i64>,
    pub message: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl Notification {
    /// Expects the `actor_username` column from a join on profiles.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get("kind")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            actor_id: row.get("actor_id")?,
            actor_username: row.get("actor_username")?,
            kind: kind.parse().unwrap_or(NotificationKind::Moderation),
            proverb_id: row.get("proverb_id")?,
            message: row.get("message")?,
            is_read: row.get::<_, i64>("is_read")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        conn: &Connection,
        user_id: i64,
        actor_id: Option<i64>,
        kind: NotificationKind,
        proverb_id: Option<i64>,
        message: Option<&str>,
    ) -> PhResult<i64> {
        conn.execute(
            "INSERT INTO notifications (user_id, actor_id, kind, proverb_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, actor_id, kind.as_str(), proverb_id, message, timestamp_now()],
        )
        .map_err(map_db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn list_for_user(
        conn: &Connection,
        user_id: i64,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> PhResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT n.*, a.username AS actor_username
                 FROM notifications n
                 LEFT JOIN profiles a ON a.id = n.actor_id
                 WHERE n.user_id = ?1 AND (?2 = 0 OR n.is_read = 0)
                 ORDER BY n.created_at DESC, n.id DESC
                 LIMIT ?3 OFFSET ?4",
            )
            .map_err(map_db_err)?;

        let rows = stmt
            .query_map(params![user_id, unread_only as i64, limit, offset], Self::from_row)
            .map_err(map_db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }

    pub fn unread_count(conn: &Connection, user_id: i64) -> PhResult<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            [user_id],
            |r| r.get(0),
        )
        .map_err(map_db_err)
    }

    /// Mark one notification read. Scoped to the owner so users cannot touch
    /// each other's rows.
    pub fn mark_read(conn: &Connection, id: i64, user_id: i64) -> PhResult<bool> {
        let changed = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }

    pub fn mark_all_read(conn: &Connection, user_id: i64) -> PhResult<usize> {
        conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            [user_id],
        )
        .map_err(map_db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO profiles (id, username, email, password_hash, created_at, updated_at)
                 VALUES (1, 'kofi', 'k@example.com', 'x', 't', 't'),
                        (2, 'ama', 'a@example.com', 'x', 't', 't');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [NotificationKind::Like, NotificationKind::Follow, NotificationKind::Badge] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("poke".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_read_state() {
        let conn = setup();
        let id = Notification::create(&conn, 2, Some(1), NotificationKind::Follow, None, None).unwrap();
        Notification::create(&conn, 2, Some(1), NotificationKind::Like, None, None).unwrap();

        assert_eq!(Notification::unread_count(&conn, 2).unwrap(), 2);
        let list = Notification::list_for_user(&conn, 2, false, 10, 0).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].actor_username.as_deref(), Some("kofi"));

        // Only the owner can mark it read
        assert!(!Notification::mark_read(&conn, id, 1).unwrap());
        assert!(Notification::mark_read(&conn, id, 2).unwrap());
        assert_eq!(Notification::list_for_user(&conn, 2, true, 10, 0).unwrap().len(), 1);

        assert_eq!(Notification::mark_all_read(&conn, 2).unwrap(), 1);
        assert_eq!(Notification::unread_count(&conn, 2).unwrap(), 0);
    }
}
