//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Proverb Hub";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 1;

/// Default page size for feeds and listings.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Upper bound for any caller-supplied page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for the admin log viewer.
pub const DEFAULT_LOG_PAGE_SIZE: i64 = 50;

/// Default number of entries on the leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: i64 = 10;

/// Cache time-to-live policy, in seconds, per data category.
pub mod cache_ttl {
    pub const PROFILE_SECS: u64 = 300;
    pub const FEED_SECS: u64 = 60;
    pub const LEADERBOARD_SECS: u64 = 900;
    pub const USER_STATS_SECS: u64 = 300;
}

/// Named sliding-window limits: (max requests, window in seconds).
pub mod rate_limits {
    pub const LOGIN: (u32, u64) = (5, 15 * 60);
    pub const EMAIL_CHANGE: (u32, u64) = (2, 60 * 60);
    pub const PASSWORD_CHANGE: (u32, u64) = (3, 60 * 60);
    pub const PROFILE_UPDATE: (u32, u64) = (10, 60);
    pub const API: (u32, u64) = (100, 60);
}

/// Input validation limits.
pub mod validation {
    pub const USERNAME_MIN_LEN: usize = 3;
    pub const USERNAME_MAX_LEN: usize = 30;
    pub const EMAIL_MAX_LEN: usize = 254;
    pub const PASSWORD_MAX_LEN: usize = 128;
    pub const DISPLAY_NAME_MAX_LEN: usize = 50;
    pub const BIO_MAX_LEN: usize = 300;
    pub const URL_MAX_LEN: usize = 200;
    pub const PROVERB_MIN_LEN: usize = 5;
    pub const PROVERB_MAX_LEN: usize = 500;
    pub const ORIGIN_MAX_LEN: usize = 100;
    pub const MEANING_MAX_LEN: usize = 1000;
    pub const COMMENT_MAX_LEN: usize = 500;
    pub const REPORT_REASON_MAX_LEN: usize = 500;
    pub const SEARCH_MAX_LEN: usize = 100;
}

/// Role identifiers stored on profiles.
pub mod roles {
    pub const USER: &str = "user";
    pub const ADMIN: &str = "admin";

    /// All valid roles.
    pub const ALL: &[&str] = &[USER, ADMIN];
}
