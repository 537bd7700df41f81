//! Session entity model.
//!
//! Only the SHA-256 hash of a session token is persisted; the raw token lives
//! in the client cookie.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::PhResult;

use crate::db::map_db_err;
use super::timestamp_now;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: i64,
    pub ip: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

impl Session {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            token_hash: row.get("token_hash")?,
            user_id: row.get("user_id")?,
            ip: row.get("ip")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
        })
    }

    pub fn create(
        conn: &Connection,
        token_hash: &str,
        user_id: i64,
        ip: Option<&str>,
        expires_at: &str,
    ) -> PhResult<Self> {
        let now = timestamp_now();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, ip, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![token_hash, user_id, ip, now, expires_at],
        )
        .map_err(map_db_err)?;

        Ok(Self {
            token_hash: token_hash.to_string(),
            user_id,
            ip: ip.map(String::from),
            created_at: now,
            expires_at: expires_at.to_string(),
        })
    }

    /// Find a session that has not yet expired.
    pub fn find_active(conn: &Connection, token_hash: &str, now: &str) -> PhResult<Option<Self>> {
        match conn.query_row(
            "SELECT * FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![token_hash, now],
            Self::from_row,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_db_err(e)),
        }
    }

    pub fn delete(conn: &Connection, token_hash: &str) -> PhResult<bool> {
        let changed = conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }

    /// Revoke every session for a user except `keep`.
    pub fn delete_for_user_except(conn: &Connection, user_id: i64, keep: Option<&str>) -> PhResult<usize> {
        conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND token_hash IS NOT ?2",
            params![user_id, keep],
        )
        .map_err(map_db_err)
    }

    /// Remove expired sessions. Returns the number purged.
    pub fn purge_expired(conn: &Connection, now: &str) -> PhResult<usize> {
        conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])
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
        conn.execute(
            "INSERT INTO profiles (id, username, email, password_hash, created_at, updated_at)
             VALUES (1, 'kofi', 'k@example.com', 'x', 't', 't')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_active_and_expired() {
        let conn = setup();
        Session::create(&conn, "live", 1, Some("10.0.0.1"), "2099-01-01T00:00:00.000Z").unwrap();
        Session::create(&conn, "old", 1, None, "2000-01-01T00:00:00.000Z").unwrap();

        let now = timestamp_now();
        assert!(Session::find_active(&conn, "live", &now).unwrap().is_some());
        assert!(Session::find_active(&conn, "old", &now).unwrap().is_none());
        assert_eq!(Session::purge_expired(&conn, &now).unwrap(), 1);
    }

    #[test]
    fn test_revoke_others() {
        let conn = setup();
        for t in ["a", "b", "c"] {
            Session::create(&conn, t, 1, None, "2099-01-01T00:00:00.000Z").unwrap();
        }
        let removed = Session::delete_for_user_except(&conn, 1, Some("b")).unwrap();
        assert_eq!(removed, 2);
        let now = timestamp_now();
        assert!(Session::find_active(&conn, "b", &now).unwrap().is_some());
        assert!(Session::delete(&conn, "b").unwrap());
        assert!(!Session::delete(&conn, "b").unwrap());
    }
}
