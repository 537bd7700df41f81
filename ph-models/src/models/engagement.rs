//! Likes, bookmarks and follows.
//!
//! All three are (actor, target) pair tables whose primary key forbids
//! duplicates, so they share one toggle implementation.

use rusqlite::{params, Connection};
use ph_core::error::PhResult;

use crate::db::map_db_err;
use super::timestamp_now;

/// A pair table that can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairTable {
    Likes,
    Bookmarks,
    Follows,
}

impl PairTable {
    fn table(self) -> &'static str {
        match self {
            Self::Likes => "likes",
            Self::Bookmarks => "bookmarks",
            Self::Follows => "follows",
        }
    }

    fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Likes | Self::Bookmarks => ("user_id", "proverb_id"),
            Self::Follows => ("follower_id", "following_id"),
        }
    }
}

/// Whether the pair row exists.
pub fn exists(conn: &Connection, table: PairTable, actor: i64, target: i64) -> PhResult<bool> {
    let (a, b) = table.columns();
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {a} = ?1 AND {b} = ?2)", table.table());
    conn.query_row(&sql, params![actor, target], |r| r.get::<_, bool>(0))
        .map_err(map_db_err)
}

/// Flip the pair row. Returns the new state (`true` = now present).
///
/// Runs delete-then-insert so a concurrent duplicate insert is absorbed by
/// `INSERT OR IGNORE` rather than surfacing as a constraint error.
pub fn toggle(conn: &Connection, table: PairTable, actor: i64, target: i64) -> PhResult<bool> {
    let (a, b) = table.columns();
    let name = table.table();

    let removed = conn
        .execute(
            &format!("DELETE FROM {name} WHERE {a} = ?1 AND {b} = ?2"),
            params![actor, target],
        )
        .map_err(map_db_err)?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        &format!("INSERT OR IGNORE INTO {name} ({a}, {b}, created_at) VALUES (?1, ?2, ?3)"),
        params![actor, target, timestamp_now()],
    )
    .map_err(map_db_err)?;
    Ok(true)
}

/// Number of rows pointing at `target`.
pub fn count_for_target(conn: &Connection, table: PairTable, target: i64) -> PhResult<i64> {
    let (_, b) = table.columns();
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {b} = ?1", table.table());
    conn.query_row(&sql, [target], |r| r.get(0)).map_err(map_db_err)
}

/// Number of rows created by `actor`.
pub fn count_for_actor(conn: &Connection, table: PairTable, actor: i64) -> PhResult<i64> {
    let (a, _) = table.columns();
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {a} = ?1", table.table());
    conn.query_row(&sql, [actor], |r| r.get(0)).map_err(map_db_err)
}

/// Total likes received across all of a user's proverbs.
pub fn likes_received(conn: &Connection, user_id: i64) -> PhResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes l JOIN proverbs p ON p.id = l.proverb_id WHERE p.user_id = ?1",
        [user_id],
        |r| r.get(0),
    )
    .map_err(map_db_err)
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
                        (2, 'ama', 'a@example.com', 'x', 't', 't');
             INSERT INTO proverbs (id, user_id, content, created_at, updated_at)
                 VALUES (1, 2, 'When the roots are deep, there is no reason to fear the wind', 't', 't');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_like_toggle() {
        let conn = setup();
        assert!(toggle(&conn, PairTable::Likes, 1, 1).unwrap());
        assert!(exists(&conn, PairTable::Likes, 1, 1).unwrap());
        assert_eq!(count_for_target(&conn, PairTable::Likes, 1).unwrap(), 1);
        assert_eq!(likes_received(&conn, 2).unwrap(), 1);

        assert!(!toggle(&conn, PairTable::Likes, 1, 1).unwrap());
        assert!(!exists(&conn, PairTable::Likes, 1, 1).unwrap());
        assert_eq!(count_for_target(&conn, PairTable::Likes, 1).unwrap(), 0);
    }

    #[test]
    fn test_follow_counts() {
        let conn = setup();
        toggle(&conn, PairTable::Follows, 1, 2).unwrap();
        assert_eq!(count_for_target(&conn, PairTable::Follows, 2).unwrap(), 1);
        assert_eq!(count_for_actor(&conn, PairTable::Follows, 1).unwrap(), 1);
        assert_eq!(count_for_actor(&conn, PairTable::Follows, 2).unwrap(), 0);
    }
}
