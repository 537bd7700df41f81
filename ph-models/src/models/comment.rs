//! Comment entity model.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::PhResult;

use crate::db::map_db_err;
use super::timestamp_now;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub proverb_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
}

/// A comment joined with its author's public name fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub proverb_id: i64,
    pub content: String,
    pub created_at: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_display_name: Option<String>,
}

impl Comment {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            proverb_id: row.get("proverb_id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> PhResult<Option<Self>> {
        match conn.query_row("SELECT * FROM comments WHERE id = ?1", [id], Self::from_row) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_db_err(e)),
        }
    }

    pub fn create(conn: &Connection, proverb_id: i64, user_id: i64, content: &str) -> PhResult<Self> {
        let now = timestamp_now();
        conn.execute(
            "INSERT INTO comments (proverb_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![proverb_id, user_id, content, now],
        )
        .map_err(map_db_err)?;

        Ok(Self {
            id: conn.last_insert_rowid(),
            proverb_id,
            user_id,
            content: content.to_string(),
            created_at: now,
        })
    }

    pub fn delete(conn: &Connection, id: i64) -> PhResult<bool> {
        let changed = conn
            .execute("DELETE FROM comments WHERE id = ?1", [id])
            .map_err(map_db_err)?;
        Ok(changed > 0)
    }

    /// Comments on a proverb, oldest first.
    pub fn list_for_proverb(conn: &Connection, proverb_id: i64, limit: i64, offset: i64) -> PhResult<Vec<CommentView>> {
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.proverb_id, c.content, c.created_at,
                        p.id AS author_id, p.username, p.display_name
                 FROM comments c
                 JOIN profiles p ON p.id = c.user_id
                 WHERE c.proverb_id = ?1
                 ORDER BY c.created_at ASC, c.id ASC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(map_db_err)?;

        let rows = stmt
            .query_map(params![proverb_id, limit, offset], |row| {
                Ok(CommentView {
                    id: row.get(0)?,
                    proverb_id: row.get(1)?,
                    content: row.get(2)?,
                    created_at: row.get(3)?,
                    author_id: row.get(4)?,
                    author_username: row.get(5)?,
                    author_display_name: row.get(6)?,
                })
            })
            .map_err(map_db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_comment_listing() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO profiles (id, username, email, password_hash, display_name, created_at, updated_at)
                 VALUES (1, 'kofi', 'k@example.com', 'x', 'Kofi A', 't', 't');
             INSERT INTO proverbs (id, user_id, content, created_at, updated_at)
                 VALUES (1, 1, 'One finger cannot lift a pebble', 't', 't');",
        )
        .unwrap();

        let first = Comment::create(&conn, 1, 1, "So true").unwrap();
        Comment::create(&conn, 1, 1, "My grandmother said this").unwrap();

        let list = Comment::list_for_proverb(&conn, 1, 10, 0).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first.id);
        assert_eq!(list[0].author_display_name.as_deref(), Some("Kofi A"));

        assert!(Comment::delete(&conn, first.id).unwrap());
        assert_eq!(Comment::list_for_proverb(&conn, 1, 10, 0).unwrap().len(), 1);
    }
}
