//! Content report entity model.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use super::timestamp_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Dismissed,
    Removed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Dismissed => "dismissed",
            Self::Removed => "removed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "dismissed" => Ok(Self::Dismissed),
            "removed" => Ok(Self::Removed),
            other => Err(PhError::validation(format!("unknown report status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub proverb_id: Option<i64>,
    pub reason: String,
    pub status: ReportStatus,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

impl Report {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            reporter_id: row.get("reporter_id")?,
            proverb_id: row.get("proverb_id")?,
            reason: row.get("reason")?,
            status: status.parse().unwrap_or(ReportStatus::Open),
            resolved_by: row.get("resolved_by")?,
            resolved_at: row.get("resolved_at")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> PhResult<Option<Self>> {
        match conn.query_row("SELECT * FROM reports WHERE id = ?1", [id], Self::from_row) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_db_err(e)),
        }
    }

    /// File a report. A second open report by the same user on the same
    /// proverb is a `Conflict`.
    pub fn create(conn: &Connection, reporter_id: i64, proverb_id: i64, reason: &str) -> PhResult<Self> {
        let now = timestamp_now();
        conn.execute(
            "INSERT INTO reports (reporter_id, proverb_id, reason, status, created_at)
             VALUES (?1, ?2, ?3, 'open', ?4)",
            params![reporter_id, proverb_id, reason, now],
        )
        .map_err(map_db_err)?;

        Ok(Self {
            id: conn.last_insert_rowid(),
            reporter_id,
            proverb_id: Some(proverb_id),
            reason: reason.to_string(),
            status: ReportStatus::Open,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
        })
    }

    pub fn list(conn: &Connection, status: Option<ReportStatus>, limit: i64, offset: i64) -> PhResult<Vec<Self>> {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM reports
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(map_db_err)?;
        let rows = stmt
            .query_map(params![status.map(|s| s.as_str()), limit, offset], Self::from_row)
            .map_err(map_db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }

    /// Close an open report. Returns false if it was not open.
    pub fn resolve(conn: &Connection, id: i64, status: ReportStatus, resolver_id: i64) -> PhResult<bool> {
        if status == ReportStatus::Open {
            return Err(PhError::validation("a report cannot be resolved to open"));
        }
        let changed = conn
            .execute(
                "UPDATE reports SET status = ?1, resolved_by = ?2, resolved_at = ?3
                 WHERE id = ?4 AND status = 'open'",
                params![status.as_str(), resolver_id, timestamp_now(), id],
            )
            .map_err(map_db_err)?;
        Ok(changed > 0)
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
                        (2, 'admin', 'admin@example.com', 'x', 't', 't');
             INSERT INTO proverbs (id, user_id, content, created_at, updated_at)
                 VALUES (1, 1, 'A tree is known by its fruit', 't', 't');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_one_open_report_per_user() {
        let conn = setup();
        let r = Report::create(&conn, 1, 1, "spam").unwrap();
        let err = Report::create(&conn, 1, 1, "spam again").unwrap_err();
        assert!(matches!(err, PhError::Conflict(_)));

        // Once resolved, a new report is allowed
        assert!(Report::resolve(&conn, r.id, ReportStatus::Dismissed, 2).unwrap());
        assert!(Report::create(&conn, 1, 1, "still spam").is_ok());
    }

    #[test]
    fn test_resolve_only_open() {
        let conn = setup();
        let r = Report::create(&conn, 1, 1, "offensive").unwrap();
        assert!(Report::resolve(&conn, r.id, ReportStatus::Removed, 2).unwrap());
        assert!(!Report::resolve(&conn, r.id, ReportStatus::Dismissed, 2).unwrap());
        assert!(Report::resolve(&conn, r.id, ReportStatus::Open, 2).is_err());

        let closed = Report::find_by_id(&conn, r.id).unwrap().unwrap();
        assert_eq!(closed.status, ReportStatus::Removed);
        assert_eq!(closed.resolved_by, Some(2));
        assert_eq!(Report::list(&conn, Some(ReportStatus::Open), 10, 0).unwrap().len(), 0);
        assert_eq!(Report::list(&conn, None, 10, 0).unwrap().len(), 1);
    }
}
