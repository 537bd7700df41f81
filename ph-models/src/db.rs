//! SQLite pool and lifecycle: open, integrity check, schema, migrations,
//! transactions, row counts and reset.

use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode};
use tracing::{info, warn, error};

use ph_core::error::{PhError, PhResult};
use ph_core::config::DatabaseConfig;

use crate::schema;
use crate::migrations;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Map a rusqlite error into the application taxonomy.
///
/// Constraint violations become `Conflict` so that duplicate usernames or
/// repeated reports surface as client errors; everything else is a
/// database error.
pub fn map_db_err(e: rusqlite::Error) -> PhError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            PhError::Conflict(msg.clone().unwrap_or_else(|| "constraint violation".into()))
        }
        _ => PhError::Database(e.to_string()),
    }
}

/// Tables reported by [`Database::stats`], in display order.
pub const COUNTED_TABLES: [&str; 11] = [
    "profiles",
    "sessions",
    "proverbs",
    "comments",
    "likes",
    "bookmarks",
    "follows",
    "notifications",
    "reports",
    "security_audit_log",
    "application_logs",
];

/// Shared handle to the SQLite pool.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open (creating if needed) the database file, build the pool, then
    /// create the schema and apply migrations. The integrity check runs
    /// first when `integrity_check_on_startup` is set.
    pub fn init(db_path: &Path, config: &DatabaseConfig) -> PhResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("opening database at {}", db_path.display());

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
            }))
            .build(SqliteConnectionManager::file(db_path))
            .map_err(pool_err)?;
        let db = Self { pool: Arc::new(pool) };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        let conn = db.conn()?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)?;
        info!("database ready (pool size {})", config.pool_size);
        drop(conn);

        Ok(db)
    }

    pub fn conn(&self) -> PhResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(pool_err)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Liveness check for the health endpoint.
    pub fn ping(&self) -> PhResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(map_db_err)?;
        Ok(())
    }

    /// `PRAGMA integrity_check`. Every reported problem ends up in the error.
    pub fn run_integrity_check(&self) -> PhResult<()> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("PRAGMA integrity_check").map_err(map_db_err)?;
        let problems = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_db_err)?;

        if problems.iter().all(|p| p == "ok") {
            info!("database integrity check passed");
            return Ok(());
        }
        let report = problems.join("; ");
        error!("database integrity check failed: {report}");
        Err(PhError::IntegrityCheck(report))
    }

    /// Run `f` inside a transaction, committing only if it succeeds.
    pub fn transaction<T, F>(&self, f: F) -> PhResult<T>
    where
        F: FnOnce(&Connection) -> PhResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_db_err)?;
        let result = f(&tx)?;
        tx.commit().map_err(map_db_err)?;
        Ok(result)
    }

    /// Row counts for [`COUNTED_TABLES`].
    pub fn stats(&self) -> PhResult<DatabaseStats> {
        let conn = self.conn()?;
        let tables = COUNTED_TABLES
            .iter()
            .map(|&table| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                    .map(|rows| TableCount { table, rows })
                    .map_err(map_db_err)
            })
            .collect::<PhResult<Vec<_>>>()?;
        Ok(DatabaseStats { tables })
    }

    /// Drop and recreate every table. Migrations re-seed the badges.
    pub fn reset(&self) -> PhResult<()> {
        warn!("resetting database, all data will be lost");
        let conn = self.conn()?;
        schema::drop_tables(&conn)?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)?;
        info!("database reset complete");
        Ok(())
    }
}

fn pool_err(e: r2d2::Error) -> PhError {
    PhError::Pool(e.to_string())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStats {
    pub tables: Vec<TableCount>,
}

impl DatabaseStats {
    /// Row count for one table, if it is counted.
    pub fn rows(&self, table: &str) -> Option<i64> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }

    pub fn total_rows(&self) -> i64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.tables.iter().map(|t| format!("{}={}", t.table, t.rows)).collect();
        f.write_str(&parts.join(", "))
    }
}

/// r2d2 connection customizer that applies PRAGMA settings.
#[derive(Debug)]
struct ConnectionCustomizer {
    wal_mode: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        // foreign_keys drives ON DELETE CASCADE for engagement rows
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA cache_size=-16000;
             PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let config = DatabaseConfig::default();
        let db = Database::init(&path, &config).unwrap();
        (db, dir)
    }

    #[test]
    fn test_database_init() {
        let (db, _dir) = test_db();
        let stats = db.stats().unwrap();
        assert_eq!(stats.tables.len(), COUNTED_TABLES.len());
        assert_eq!(stats.rows("profiles"), Some(0));
        assert_eq!(stats.total_rows(), 0);
        assert_eq!(stats.rows("badges"), None);
        assert!(db.ping().is_ok());
    }

    #[test]
    fn test_integrity_check() {
        let (db, _dir) = test_db();
        assert!(db.run_integrity_check().is_ok());
    }

    #[test]
    fn test_transaction() {
        let (db, _dir) = test_db();
        let failed: PhResult<()> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO application_logs (level, message, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params!["info", "rolled back", "2024-01-01T00:00:00.000Z"],
            )
            .map_err(map_db_err)?;
            Err(PhError::validation("abort"))
        });
        assert!(failed.is_err());

        let result = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO application_logs (level, message, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params!["info", "hello", "2024-01-01T00:00:00.000Z"],
            )
            .map_err(map_db_err)?;
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(db.stats().unwrap().rows("application_logs"), Some(1));
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let (db, _dir) = test_db();
        let conn = db.conn().unwrap();
        let insert = "INSERT INTO profiles (username, email, password_hash, created_at, updated_at)
                      VALUES ('amara', 'a@example.com', 'x', 't', 't')";
        conn.execute(insert, []).unwrap();
        let err = conn.execute(insert, []).map_err(map_db_err).unwrap_err();
        assert!(matches!(err, PhError::Conflict(_)));
    }

    #[test]
    fn test_reset() {
        let (db, _dir) = test_db();
        db.reset().unwrap();
        // Badges are re-seeded by migrations
        let conn = db.conn().unwrap();
        let badges: i64 = conn.query_row("SELECT COUNT(*) FROM badges", [], |r| r.get(0)).unwrap();
        assert!(badges > 0);
    }
}
