//! Security audit trail.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::PhResult;

use crate::db::map_db_err;
use super::timestamp_now;

/// One security-relevant event (sign-in, failed sign-in, password change...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub event: String,
    pub ip: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

impl SecurityEvent {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get("metadata")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            event: row.get("event")?,
            ip: row.get("ip")?,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
            created_at: row.get("created_at")?,
        })
    }

    pub fn record(
        conn: &Connection,
        user_id: Option<i64>,
        event: &str,
        ip: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> PhResult<i64> {
        conn.execute(
            "INSERT INTO security_audit_log (user_id, event, ip, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, event, ip, metadata.map(|m| m.to_string()), timestamp_now()],
        )
        .map_err(map_db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent events for a user.
    pub fn list_for_user(conn: &Connection, user_id: i64, limit: i64) -> PhResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM security_audit_log WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )
            .map_err(map_db_err)?;
        let rows = stmt.query_map(params![user_id, limit], Self::from_row).map_err(map_db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }

    /// Count events of one kind since a timestamp.
    pub fn count_since(conn: &Connection, event: &str, since: &str) -> PhResult<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM security_audit_log WHERE event = ?1 AND created_at >= ?2",
            params![event, since],
            |r| r.get(0),
        )
        .map_err(map_db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_record_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO profiles (id, username, email, password_hash, created_at, updated_at)
             VALUES (1, 'kofi', 'k@example.com', 'x', 't', 't')",
            [],
        )
        .unwrap();

        let meta = serde_json::json!({"reason": "bad password"});
        SecurityEvent::record(&conn, Some(1), "sign_in_failed", Some("10.0.0.9"), Some(&meta)).unwrap();
        SecurityEvent::record(&conn, Some(1), "sign_in", Some("10.0.0.9"), None).unwrap();

        let events = SecurityEvent::list_for_user(&conn, 1, 10).unwrap();
        assert_eq!(events.len(), 2);
        let failed = events.iter().find(|e| e.event == "sign_in_failed").unwrap();
        assert_eq!(failed.metadata.as_ref().unwrap()["reason"], "bad password");
        assert_eq!(SecurityEvent::count_since(&conn, "sign_in", "2000-01-01").unwrap(), 1);
    }
}
