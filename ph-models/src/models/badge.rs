//! Badge definitions and awards.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use super::timestamp_now;

/// The per-user counter a badge threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeMetric {
    Proverbs,
    LikesReceived,
    Followers,
}

impl BadgeMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proverbs => "proverbs",
            Self::LikesReceived => "likes_received",
            Self::Followers => "followers",
        }
    }
}

impl FromStr for BadgeMetric {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proverbs" => Ok(Self::Proverbs),
            "likes_received" => Ok(Self::LikesReceived),
            "followers" => Ok(Self::Followers),
            other => Err(PhError::validation(format!("unknown badge metric: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub metric: BadgeMetric,
    pub threshold: i64,
}

/// A badge held by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardedBadge {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub awarded_at: String,
}

impl Badge {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metric: String = row.get("metric")?;
        let metric = metric.parse().map_err(|e: PhError| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            description: row.get("description")?,
            metric,
            threshold: row.get("threshold")?,
        })
    }

    pub fn all(conn: &Connection) -> PhResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM badges ORDER BY metric, threshold")
            .map_err(map_db_err)?;
        let rows = stmt.query_map([], Self::from_row).map_err(map_db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }

    /// Award a badge. Returns true only on the first award.
    pub fn award(conn: &Connection, user_id: i64, badge_id: i64) -> PhResult<bool> {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO user_badges (user_id, badge_id, awarded_at) VALUES (?1, ?2, ?3)",
                params![user_id, badge_id, timestamp_now()],
            )
            .map_err(map_db_err)?;
        Ok(inserted > 0)
    }

    pub fn list_for_user(conn: &Connection, user_id: i64) -> PhResult<Vec<AwardedBadge>> {
        let mut stmt = conn
            .prepare(
                "SELECT b.slug, b.name, b.description, ub.awarded_at
                 FROM user_badges ub JOIN badges b ON b.id = ub.badge_id
                 WHERE ub.user_id = ?1
                 ORDER BY ub.awarded_at ASC",
            )
            .map_err(map_db_err)?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(AwardedBadge {
                    slug: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    awarded_at: row.get(3)?,
                })
            })
            .map_err(map_db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
    }
}
