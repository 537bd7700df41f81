//! Versioned database migrations.
//!
//! The base schema is created by `schema::create_tables`; migrations move the
//! stored version forward and seed reference data.

use rusqlite::{params, Connection};
use tracing::{info, warn};
use ph_core::error::{PhError, PhResult};
use ph_core::constants::DB_SCHEMA_VERSION;

/// Run all pending migrations on the database.
pub fn run_migrations(conn: &Connection) -> PhResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= DB_SCHEMA_VERSION {
        info!("database schema is up to date (version {current_version})");
        return Ok(());
    }

    info!("running migrations from version {current_version} to {DB_SCHEMA_VERSION}");

    for version in (current_version + 1)..=DB_SCHEMA_VERSION {
        run_migration(conn, version)?;
    }

    set_schema_version(conn, DB_SCHEMA_VERSION)?;
    info!("migrations complete, schema at version {DB_SCHEMA_VERSION}");
    Ok(())
}

/// Current schema version stored in the database.
pub fn get_schema_version(conn: &Connection) -> PhResult<i32> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| PhError::Migration(e.to_string()))?;

    if count == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])
            .map_err(|e| PhError::Migration(e.to_string()))?;
        return Ok(0);
    }

    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
    .map_err(|e| PhError::Migration(e.to_string()))
}

fn set_schema_version(conn: &Connection, version: i32) -> PhResult<()> {
    conn.execute("UPDATE schema_version SET version = ?1", [version])
        .map_err(|e| PhError::Migration(e.to_string()))?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> PhResult<()> {
    info!("applying migration version {version}");

    match version {
        1 => migration_v1(conn),
        _ => {
            warn!("unknown migration version {version}, skipping");
            Ok(())
        }
    }
}

/// Migration v1: seed the badge catalogue.
fn migration_v1(conn: &Connection) -> PhResult<()> {
    let mut inserted = 0;
    for (slug, name, description, metric, threshold) in DEFAULT_BADGES {
        inserted += conn
            .execute(
                "INSERT OR IGNORE INTO badges (slug, name, description, metric, threshold)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![slug, name, description, metric, threshold],
            )
            .map_err(|e| PhError::Migration(e.to_string()))?;
    }

    if inserted > 0 {
        info!("seeded {inserted} badges");
    }
    Ok(())
}

/// (slug, name, description, metric, threshold)
const DEFAULT_BADGES: &[(&str, &str, &str, &str, i64)] = &[
    ("first-proverb", "First Words", "Shared a first proverb", "proverbs", 1),
    ("storyteller", "Storyteller", "Shared 10 proverbs", "proverbs", 10),
    ("elder", "Elder", "Shared 50 proverbs", "proverbs", 50),
    ("well-liked", "Well Liked", "Received 10 likes", "likes_received", 10),
    ("beloved", "Beloved", "Received 100 likes", "likes_received", 100),
    ("gathering", "Gathering", "Gained 10 followers", "followers", 10),
    ("village", "The Village", "Gained 100 followers", "followers", 100),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_badges_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM badges", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, DEFAULT_BADGES.len() as i64);
    }
}
