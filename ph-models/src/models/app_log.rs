//! Application log rows shown in the admin log viewer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use super::timestamp_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(PhError::validation(format!("unknown log level: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLog {
    pub id: i64,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub user_id: Option<i64>,
    pub created_at: String,
}

impl AppLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let level: String = row.get("level")?;
        let context: Option<String> = row.get("context")?;
        Ok(Self {
            id: row.get("id")?,
            level: level.parse().unwrap_or(LogLevel::Info),
            message: row.get("message")?,
            context: context.and_then(|c| serde_json::from_str(&c).ok()),
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn insert(
        conn: &Connection,
        level: LogLevel,
        message: &str,
        context: Option<&serde_json::Value>,
        user_id: Option<i64>,
    ) -> PhResult<i64> {
        conn.execute(
            "INSERT INTO application_logs (level, message, context, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![level.as_str(), message, context.map(|c| c.to_string()), user_id, timestamp_now()],
        )
        .map_err(map_db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete rows older than the given timestamp. Returns rows removed.
    pub fn prune_before(conn: &Connection, before: &str) -> PhResult<usize> {
        conn.execute("DELETE FROM application_logs WHERE created_at < ?1", [before])
            .map_err(map_db_err)
    }
}
