//! Entity model definitions.

pub mod profile;
pub mod session;
pub mod proverb;
pub mod comment;
pub mod engagement;
pub mod notification;
pub mod badge;
pub mod report;
pub mod audit;
pub mod app_log;

use chrono::{SecondsFormat, Utc};

/// Current UTC time as stored in every `*_at` column.
///
/// Fixed-width RFC 3339 with millisecond precision, so lexical order in
/// SQLite matches chronological order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format an arbitrary instant in the stored timestamp layout.
pub fn format_timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_layout() {
        let ts = timestamp_now();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
    }
}
