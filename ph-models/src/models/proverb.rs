//! Proverb entity model.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::PhResult;

use crate::db::map_db_err;
use super::timestamp_now;

/// A proverb as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proverb {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub origin: Option<String>,
    pub meaning: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating or replacing a proverb's text fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProverb {
    pub content: String,
    pub origin: Option<String>,
    pub meaning: Option<String>,
}

impl Proverb {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            origin: row.get("origin")?,
            meaning: row.get("meaning")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> PhResult<Option<Self>> {
        match conn.query_row("SELECT * FROM proverbs WHERE id = ?1", [id], Self::from_row) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_db_err(e)),
        }
    }

    pub fn create(conn: &Connection, user_id: i64, input: &NewProverb) -> PhResult<Self> {
        let now = timestamp_now();
        conn.execute(
            "INSERT INTO proverbs (user_id, content, origin, meaning, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![user_id, input.content, input.origin, input.meaning, now],
        )
        .map_err(map_db_err)?;

        Ok(Self {
            id: conn.last_insert_rowid(),
            user_id,
            content: input.content.clone(),
            origin: input.origin.clone(),
            meaning: input.meaning.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Replace the text fields. Returns the fresh row, or `None` if missing.
    pub fn update(conn: &Connection, id: i64, input: &NewProverb) -> PhResult<Option<Self>> {
        let changed = conn
            .execute(
                "UPDATE proverbs SET content = ?1, origin = ?2, meaning = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![input.content, input.origin, input.meaning, timestamp_now(), id],
            )
            .map_err(map_db_err)?;
        if changed == 0 {
            return Ok(None);
        }
        Self::find_by_id(conn, id)
    }

    /// Delete a proverb. Likes, bookmarks and comments cascade.
    pub fn delete(conn: &Connection, id: i64) -> PhResult<bool> {
        let changed = conn
            .execute("DELETE FROM proverbs WHERE id = ?1", [id])
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }

    pub fn count_by_user(conn: &Connection, user_id: i64) -> PhResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM proverbs WHERE user_id = ?1", [user_id], |r| r.get(0))
            .map_err(map_db_err)
    }
}
