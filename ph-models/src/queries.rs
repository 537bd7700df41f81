//! Query builders for read paths.
//!
//! Feeds, profile pages, stats, leaderboards and the admin log viewer. All
//! queries are parameterized. Feed rows are viewer-independent so that the
//! cached `latest` and `popular` feeds can be shared between readers; the
//! per-viewer liked/bookmarked flags are overlaid with [`viewer_flags`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use ph_core::error::{PhError, PhResult};

use crate::db::map_db_err;
use crate::models::app_log::{AppLog, LogLevel};
use crate::models::profile::PublicProfile;

// ─── Feed Queries ───────────────────────────────────────────────────────────

/// Which proverbs a feed shows and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    /// Newest first.
    #[default]
    Latest,
    /// Most liked first, newest breaking ties.
    Popular,
    /// Newest first, only authors the viewer follows.
    Following,
}

impl FeedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Popular => "popular",
            Self::Following => "following",
        }
    }

    /// Whether the feed is the same for every viewer.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Self::Following)
    }
}

impl fmt::Display for FeedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFilter {
    type Err = PhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "popular" => Ok(Self::Popular),
            "following" => Ok(Self::Following),
            other => Err(PhError::validation(format!("unknown feed filter: {other}"))),
        }
    }
}

/// Author fields embedded in a proverb view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A proverb with author and engagement counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProverbView {
    pub id: i64,
    pub content: String,
    pub origin: Option<String>,
    pub meaning: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorSummary,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub bookmarked: bool,
}

const PROVERB_VIEW_SELECT: &str = "
    SELECT pv.id, pv.content, pv.origin, pv.meaning, pv.created_at, pv.updated_at,
           pr.id AS author_id, pr.username, pr.display_name, pr.avatar_url,
           (SELECT COUNT(*) FROM likes l WHERE l.proverb_id = pv.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.proverb_id = pv.id) AS comment_count
    FROM proverbs pv
    JOIN profiles pr ON pr.id = pv.user_id";

fn proverb_view_from_row(row: &Row<'_>) -> rusqlite::Result<ProverbView> {
    Ok(ProverbView {
        id: row.get("id")?,
        content: row.get("content")?,
        origin: row.get("origin")?,
        meaning: row.get("meaning")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        author: AuthorSummary {
            id: row.get("author_id")?,
            username: row.get("username")?,
            display_name: row.get("display_name")?,
            avatar_url: row.get("avatar_url")?,
        },
        like_count: row.get("like_count")?,
        comment_count: row.get("comment_count")?,
        liked: false,
        bookmarked: false,
    })
}

fn collect_views(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> PhResult<Vec<ProverbView>> {
    let mut stmt = conn.prepare(sql).map_err(map_db_err)?;
    let rows = stmt.query_map(args, proverb_view_from_row).map_err(map_db_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
}

/// One page of a feed.
///
/// `viewer` is required for [`FeedFilter::Following`]; without it the
/// following feed is empty.
pub fn feed(
    conn: &Connection,
    filter: FeedFilter,
    viewer: Option<i64>,
    limit: i64,
    offset: i64,
) -> PhResult<Vec<ProverbView>> {
    match filter {
        FeedFilter::Latest => collect_views(
            conn,
            &format!("{PROVERB_VIEW_SELECT} ORDER BY pv.created_at DESC, pv.id DESC LIMIT ?1 OFFSET ?2"),
            &[&limit, &offset],
        ),
        FeedFilter::Popular => collect_views(
            conn,
            &format!(
                "{PROVERB_VIEW_SELECT} ORDER BY like_count DESC, pv.created_at DESC, pv.id DESC LIMIT ?1 OFFSET ?2"
            ),
            &[&limit, &offset],
        ),
        FeedFilter::Following => {
            let Some(viewer) = viewer else {
                return Ok(Vec::new());
            };
            collect_views(
                conn,
                &format!(
                    "{PROVERB_VIEW_SELECT}
                     WHERE pv.user_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                     ORDER BY pv.created_at DESC, pv.id DESC LIMIT ?2 OFFSET ?3"
                ),
                &[&viewer, &limit, &offset],
            )
        }
    }
}

/// A single proverb view.
pub fn proverb_view(conn: &Connection, id: i64) -> PhResult<Option<ProverbView>> {
    match conn.query_row(
        &format!("{PROVERB_VIEW_SELECT} WHERE pv.id = ?1"),
        [id],
        proverb_view_from_row,
    ) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_db_err(e)),
    }
}

/// Proverbs written by one user, newest first.
pub fn proverbs_by_user(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> PhResult<Vec<ProverbView>> {
    collect_views(
        conn,
        &format!(
            "{PROVERB_VIEW_SELECT} WHERE pv.user_id = ?1
             ORDER BY pv.created_at DESC, pv.id DESC LIMIT ?2 OFFSET ?3"
        ),
        &[&user_id, &limit, &offset],
    )
}

/// Case-insensitive substring search over content, origin and meaning.
pub fn search_proverbs(conn: &Connection, query: &str, limit: i64, offset: i64) -> PhResult<Vec<ProverbView>> {
    let pattern = format!("%{}%", escape_like(query));
    collect_views(
        conn,
        &format!(
            "{PROVERB_VIEW_SELECT}
             WHERE pv.content LIKE ?1 ESCAPE '\\'
                OR pv.origin LIKE ?1 ESCAPE '\\'
                OR pv.meaning LIKE ?1 ESCAPE '\\'
             ORDER BY pv.created_at DESC, pv.id DESC LIMIT ?2 OFFSET ?3"
        ),
        &[&pattern, &limit, &offset],
    )
}

/// Proverbs a user bookmarked, most recently bookmarked first.
pub fn bookmarked_proverbs(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> PhResult<Vec<ProverbView>> {
    collect_views(
        conn,
        &format!(
            "{PROVERB_VIEW_SELECT}
             JOIN bookmarks b ON b.proverb_id = pv.id AND b.user_id = ?1
             ORDER BY b.created_at DESC, pv.id DESC LIMIT ?2 OFFSET ?3"
        ),
        &[&user_id, &limit, &offset],
    )
}

/// Liked/bookmarked flags for a viewer over a set of proverb ids.
pub fn viewer_flags(conn: &Connection, viewer: i64, ids: &[i64]) -> PhResult<HashMap<i64, (bool, bool)>> {
    let mut flags: HashMap<i64, (bool, bool)> = ids.iter().map(|id| (*id, (false, false))).collect();
    if ids.is_empty() {
        return Ok(flags);
    }

    let placeholders = (0..ids.len()).map(|i| format!("?{}", i + 2)).collect::<Vec<_>>().join(",");
    let mut args: Vec<&dyn ToSql> = vec![&viewer];
    args.extend(ids.iter().map(|id| id as &dyn ToSql));

    for (table, liked) in [("likes", true), ("bookmarks", false)] {
        let sql = format!(
            "SELECT proverb_id FROM {table} WHERE user_id = ?1 AND proverb_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql).map_err(map_db_err)?;
        let rows = stmt
            .query_map(args.as_slice(), |r| r.get::<_, i64>(0))
            .map_err(map_db_err)?;
        for id in rows {
            let id = id.map_err(map_db_err)?;
            if let Some(entry) = flags.get_mut(&id) {
                if liked { entry.0 = true } else { entry.1 = true }
            }
        }
    }

    Ok(flags)
}

/// Overlay viewer flags onto already-loaded views.
pub fn apply_viewer_flags(conn: &Connection, viewer: i64, views: &mut [ProverbView]) -> PhResult<()> {
    let ids: Vec<i64> = views.iter().map(|v| v.id).collect();
    let flags = viewer_flags(conn, viewer, &ids)?;
    for view in views.iter_mut() {
        if let Some((liked, bookmarked)) = flags.get(&view.id) {
            view.liked = *liked;
            view.bookmarked = *bookmarked;
        }
    }
    Ok(())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

// ─── Profile Queries ────────────────────────────────────────────────────────

/// Aggregate counters shown on a profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: i64,
    pub proverbs: i64,
    pub likes_received: i64,
    pub comments: i64,
    pub followers: i64,
    pub following: i64,
    pub badges: i64,
}

pub fn user_stats(conn: &Connection, user_id: i64) -> PhResult<UserStats> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM proverbs WHERE user_id = ?1),
            (SELECT COUNT(*) FROM likes l JOIN proverbs p ON p.id = l.proverb_id WHERE p.user_id = ?1),
            (SELECT COUNT(*) FROM comments WHERE user_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
            (SELECT COUNT(*) FROM user_badges WHERE user_id = ?1)",
        [user_id],
        |r| {
            Ok(UserStats {
                user_id,
                proverbs: r.get(0)?,
                likes_received: r.get(1)?,
                comments: r.get(2)?,
                followers: r.get(3)?,
                following: r.get(4)?,
                badges: r.get(5)?,
            })
        },
    )
    .map_err(map_db_err)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub proverbs: i64,
    pub likes_received: i64,
}

/// Top contributors by likes received, then by proverb count.
///
/// Banned users and users with no proverbs are excluded.
pub fn leaderboard(conn: &Connection, limit: i64) -> PhResult<Vec<LeaderboardEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT pr.id, pr.username, pr.display_name, pr.avatar_url,
                    COUNT(DISTINCT pv.id) AS proverb_count,
                    (SELECT COUNT(*) FROM likes l JOIN proverbs p2 ON p2.id = l.proverb_id
                     WHERE p2.user_id = pr.id) AS likes_received
             FROM profiles pr
             JOIN proverbs pv ON pv.user_id = pr.id
             WHERE pr.is_banned = 0
             GROUP BY pr.id
             ORDER BY likes_received DESC, proverb_count DESC, pr.id ASC
             LIMIT ?1",
        )
        .map_err(map_db_err)?;

    let rows = stmt
        .query_map([limit], |r| {
            Ok(LeaderboardEntry {
                rank: 0,
                user_id: r.get(0)?,
                username: r.get(1)?,
                display_name: r.get(2)?,
                avatar_url: r.get(3)?,
                proverbs: r.get(4)?,
                likes_received: r.get(5)?,
            })
        })
        .map_err(map_db_err)?;

    let mut entries = rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)?;
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as i64 + 1;
    }
    Ok(entries)
}

fn public_profiles(conn: &Connection, sql: &str, user_id: i64, limit: i64, offset: i64) -> PhResult<Vec<PublicProfile>> {
    let mut stmt = conn.prepare(sql).map_err(map_db_err)?;
    let rows = stmt
        .query_map(params![user_id, limit, offset], |r| {
            Ok(PublicProfile {
                id: r.get("id")?,
                username: r.get("username")?,
                display_name: r.get("display_name")?,
                bio: r.get("bio")?,
                avatar_url: r.get("avatar_url")?,
                website: r.get("website")?,
                created_at: r.get("created_at")?,
            })
        })
        .map_err(map_db_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(map_db_err)
}

/// Profiles following `user_id`, most recent first.
pub fn followers(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> PhResult<Vec<PublicProfile>> {
    public_profiles(
        conn,
        "SELECT p.* FROM follows f JOIN profiles p ON p.id = f.follower_id
         WHERE f.following_id = ?1 ORDER BY f.created_at DESC LIMIT ?2 OFFSET ?3",
        user_id,
        limit,
        offset,
    )
}

/// Profiles `user_id` follows, most recent first.
pub fn following(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> PhResult<Vec<PublicProfile>> {
    public_profiles(
        conn,
        "SELECT p.* FROM follows f JOIN profiles p ON p.id = f.following_id
         WHERE f.follower_id = ?1 ORDER BY f.created_at DESC LIMIT ?2 OFFSET ?3",
        user_id,
        limit,
        offset,
    )
}

// ─── Log Queries ────────────────────────────────────────────────────────────

/// Filter for the admin log viewer. `page` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            level: None,
            search: None,
            page: 1,
            limit: ph_core::constants::DEFAULT_LOG_PAGE_SIZE,
        }
    }
}

/// One page of log rows plus paging totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<AppLog>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub fn query_logs(conn: &Connection, query: &LogQuery) -> PhResult<LogPage> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, ph_core::constants::MAX_PAGE_SIZE);
    // Far-out pages read past the end instead of overflowing
    let offset = (page - 1).saturating_mul(limit);

    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(level) = query.level {
        args.push(Box::new(level.as_str().to_string()));
        clauses.push(format!("level = ?{}", args.len()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        args.push(Box::new(format!("%{}%", escape_like(search.trim()))));
        clauses.push(format!("message LIKE ?{} ESCAPE '\\'", args.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| &**a as &dyn ToSql).collect();
    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM application_logs {where_sql}"),
            arg_refs.as_slice(),
            |r| r.get(0),
        )
        .map_err(map_db_err)?;

    let n = args.len();
    let sql = format!(
        "SELECT * FROM application_logs {where_sql}
         ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
        n + 1,
        n + 2
    );
    let mut page_args = arg_refs.clone();
    page_args.push(&limit);
    page_args.push(&offset);

    let mut stmt = conn.prepare(&sql).map_err(map_db_err)?;
    let logs = stmt
        .query_map(page_args.as_slice(), AppLog::from_row)
        .map_err(map_db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_db_err)?;

    Ok(LogPage {
        logs,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    })
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
                        (2, 'ama', 'a@example.com', 'x', 't', 't'),
                        (3, 'yaw', 'y@example.com', 'x', 't', 't');
             INSERT INTO proverbs (id, user_id, content, created_at, updated_at) VALUES
                 (1, 1, 'By the time the fool has learned the game, the players have dispersed', '2024-01-01T00:00:00.000Z', 't'),
                 (2, 2, 'Until the lion learns to write, tales of the hunt glorify the hunter', '2024-01-02T00:00:00.000Z', 't'),
                 (3, 2, 'A child who is not embraced by the village will burn it down', '2024-01-03T00:00:00.000Z', 't');
             INSERT INTO likes (user_id, proverb_id, created_at) VALUES
                 (1, 2, 't'), (3, 2, 't'), (3, 1, 't');
             INSERT INTO follows (follower_id, following_id, created_at) VALUES (3, 1, 't');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("popular".parse::<FeedFilter>().unwrap(), FeedFilter::Popular);
        assert!("trending".parse::<FeedFilter>().is_err());
        assert!(!FeedFilter::Following.is_shared());
    }

    #[test]
    fn test_latest_and_popular() {
        let conn = setup();
        let latest = feed(&conn, FeedFilter::Latest, None, 10, 0).unwrap();
        assert_eq!(latest.iter().map(|v| v.id).collect::<Vec<_>>(), vec![3, 2, 1]);

        let popular = feed(&conn, FeedFilter::Popular, None, 10, 0).unwrap();
        assert_eq!(popular[0].id, 2);
        assert_eq!(popular[0].like_count, 2);

        let page2 = feed(&conn, FeedFilter::Latest, None, 2, 2).unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[test]
    fn test_following_feed() {
        let conn = setup();
        let feed_for_yaw = feed(&conn, FeedFilter::Following, Some(3), 10, 0).unwrap();
        assert_eq!(feed_for_yaw.len(), 1);
        assert_eq!(feed_for_yaw[0].author.username, "kofi");
        assert!(feed(&conn, FeedFilter::Following, None, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_viewer_flags() {
        let conn = setup();
        let mut views = feed(&conn, FeedFilter::Latest, None, 10, 0).unwrap();
        apply_viewer_flags(&conn, 3, &mut views).unwrap();
        let liked: Vec<i64> = views.iter().filter(|v| v.liked).map(|v| v.id).collect();
        assert_eq!(liked.len(), 2);
        assert!(views.iter().all(|v| !v.bookmarked));
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let conn = setup();
        assert_eq!(search_proverbs(&conn, "LION", 10, 0).unwrap().len(), 1);
        assert!(search_proverbs(&conn, "%", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_leaderboard() {
        let conn = setup();
        let stats = user_stats(&conn, 2).unwrap();
        assert_eq!(stats.proverbs, 2);
        assert_eq!(stats.likes_received, 2);

        let board = leaderboard(&conn, 10).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].username, "ama");
        assert_eq!(board[0].rank, 1);

        assert_eq!(followers(&conn, 1, 10, 0).unwrap()[0].username, "yaw");
        assert_eq!(following(&conn, 3, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_query_logs_paging() {
        let conn = setup();
        for i in 0..7 {
            let level = if i % 2 == 0 { LogLevel::Info } else { LogLevel::Error };
            AppLog::insert(&conn, level, &format!("event {i}"), None, None).unwrap();
        }

        let all = query_logs(&conn, &LogQuery { limit: 3, ..Default::default() }).unwrap();
        assert_eq!(all.total, 7);
        assert_eq!(all.logs.len(), 3);
        assert_eq!(all.total_pages, 3);

        let errors = query_logs(
            &conn,
            &LogQuery { level: Some(LogLevel::Error), ..Default::default() },
        )
        .unwrap();
        assert_eq!(errors.total, 3);

        let search = query_logs(
            &conn,
            &LogQuery { search: Some("event 4".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(search.total, 1);
    }

    #[test]
    fn test_query_logs_huge_page_is_empty() {
        let conn = setup();
        AppLog::insert(&conn, LogLevel::Info, "only entry", None, None).unwrap();

        let page = query_logs(&conn, &LogQuery { page: i64::MAX, limit: 50, ..Default::default() }).unwrap();
        assert!(page.logs.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, i64::MAX);
    }
}
