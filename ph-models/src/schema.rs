//! Database schema definitions and table creation.
//!
//! Composite primary keys on `likes`, `bookmarks`, `follows` and
//! `user_badges` make each (user, target) pair unique. Engagement rows
//! cascade with their proverb or profile.

use rusqlite::Connection;
use ph_core::error::{PhError, PhResult};
use tracing::info;

/// Create all database tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> PhResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| PhError::Database(format!("failed to create schema: {e}")))?;
    info!("database schema verified");
    Ok(())
}

/// Drop all tables (used for database reset).
pub fn drop_tables(conn: &Connection) -> PhResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS user_badges;
         DROP TABLE IF EXISTS badges;
         DROP TABLE IF EXISTS notifications;
         DROP TABLE IF EXISTS reports;
         DROP TABLE IF EXISTS comments;
         DROP TABLE IF EXISTS likes;
         DROP TABLE IF EXISTS bookmarks;
         DROP TABLE IF EXISTS follows;
         DROP TABLE IF EXISTS proverbs;
         DROP TABLE IF EXISTS sessions;
         DROP TABLE IF EXISTS security_audit_log;
         DROP TABLE IF EXISTS application_logs;
         DROP TABLE IF EXISTS profiles;
         DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| PhError::Database(format!("failed to drop tables: {e}")))?;
    Ok(())
}

/// Complete SQL schema for all tables.
const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- User profiles (also the credential store)
CREATE TABLE IF NOT EXISTS profiles (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    username                        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email                           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash                   TEXT NOT NULL,
    display_name                    TEXT,
    bio                             TEXT,
    avatar_url                      TEXT,
    website                         TEXT,
    role                            TEXT NOT NULL DEFAULT 'user',
    is_banned                       INTEGER NOT NULL DEFAULT 0,
    created_at                      TEXT NOT NULL,
    updated_at                      TEXT NOT NULL
);

-- Sessions (token stored hashed)
CREATE TABLE IF NOT EXISTS sessions (
    token_hash                      TEXT PRIMARY KEY NOT NULL,
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    ip                              TEXT,
    created_at                      TEXT NOT NULL,
    expires_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

-- Proverbs
CREATE TABLE IF NOT EXISTS proverbs (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    content                         TEXT NOT NULL,
    origin                          TEXT,
    meaning                         TEXT,
    created_at                      TEXT NOT NULL,
    updated_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_proverbs_user ON proverbs(user_id);
CREATE INDEX IF NOT EXISTS idx_proverbs_created ON proverbs(created_at);

-- Comments
CREATE TABLE IF NOT EXISTS comments (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    proverb_id                      INTEGER NOT NULL REFERENCES proverbs(id) ON DELETE CASCADE,
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    content                         TEXT NOT NULL,
    created_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_proverb ON comments(proverb_id, created_at);

-- Likes
CREATE TABLE IF NOT EXISTS likes (
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    proverb_id                      INTEGER NOT NULL REFERENCES proverbs(id) ON DELETE CASCADE,
    created_at                      TEXT NOT NULL,
    PRIMARY KEY (user_id, proverb_id)
);

CREATE INDEX IF NOT EXISTS idx_likes_proverb ON likes(proverb_id);

-- Bookmarks
CREATE TABLE IF NOT EXISTS bookmarks (
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    proverb_id                      INTEGER NOT NULL REFERENCES proverbs(id) ON DELETE CASCADE,
    created_at                      TEXT NOT NULL,
    PRIMARY KEY (user_id, proverb_id)
);

-- Follows
CREATE TABLE IF NOT EXISTS follows (
    follower_id                     INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    following_id                    INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    created_at                      TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id)
);

CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);

-- Notifications
CREATE TABLE IF NOT EXISTS notifications (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    actor_id                        INTEGER REFERENCES profiles(id) ON DELETE CASCADE,
    kind                            TEXT NOT NULL,
    proverb_id                      INTEGER REFERENCES proverbs(id) ON DELETE CASCADE,
    message                         TEXT,
    is_read                         INTEGER NOT NULL DEFAULT 0,
    created_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read, created_at);

-- Badge definitions (seeded by migrations)
CREATE TABLE IF NOT EXISTS badges (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    slug                            TEXT NOT NULL UNIQUE,
    name                            TEXT NOT NULL,
    description                     TEXT NOT NULL,
    metric                          TEXT NOT NULL,
    threshold                       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_badges (
    user_id                         INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    badge_id                        INTEGER NOT NULL REFERENCES badges(id) ON DELETE CASCADE,
    awarded_at                      TEXT NOT NULL,
    PRIMARY KEY (user_id, badge_id)
);

-- Content reports
CREATE TABLE IF NOT EXISTS reports (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    reporter_id                     INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    proverb_id                      INTEGER REFERENCES proverbs(id) ON DELETE SET NULL,
    reason                          TEXT NOT NULL,
    status                          TEXT NOT NULL DEFAULT 'open',
    resolved_by                     INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
    resolved_at                     TEXT,
    created_at                      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_open_unique
    ON reports(reporter_id, proverb_id) WHERE status = 'open';
CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, created_at);

-- Security audit trail
CREATE TABLE IF NOT EXISTS security_audit_log (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                         INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
    event                           TEXT NOT NULL,
    ip                              TEXT,
    metadata                        TEXT,
    created_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_user ON security_audit_log(user_id, created_at);

-- Application logs (admin log viewer)
CREATE TABLE IF NOT EXISTS application_logs (
    id                              INTEGER PRIMARY KEY AUTOINCREMENT,
    level                           TEXT NOT NULL,
    message                         TEXT NOT NULL,
    context                         TEXT,
    user_id                         INTEGER,
    created_at                      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_app_logs_level ON application_logs(level, created_at);
CREATE INDEX IF NOT EXISTS idx_app_logs_created ON application_logs(created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let tables = ["profiles", "sessions", "proverbs", "comments", "likes",
                      "bookmarks", "follows", "notifications", "badges", "user_badges",
                      "reports", "security_audit_log", "application_logs", "schema_version"];
        for table in &tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {table} should exist");
        }
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_drop_and_recreate() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        drop_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='proverbs'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_duplicate_like_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO profiles (id, username, email, password_hash, created_at, updated_at)
                 VALUES (1, 'kofi', 'k@example.com', 'x', 't', 't');
             INSERT INTO proverbs (id, user_id, content, created_at, updated_at)
                 VALUES (1, 1, 'Slowly slowly catches the monkey', 't', 't');
             INSERT INTO likes (user_id, proverb_id, created_at) VALUES (1, 1, 't');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO likes (user_id, proverb_id, created_at) VALUES (1, 1, 't')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_self_follow_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO profiles (id, username, email, password_hash, created_at, updated_at)
             VALUES (1, 'kofi', 'k@example.com', 'x', 't', 't')",
            [],
        )
        .unwrap();
        let res = conn.execute(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (1, 1, 't')",
            [],
        );
        assert!(res.is_err());
    }
}
