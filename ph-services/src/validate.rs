//! Input validation shared by the server actions.

use lazy_static::lazy_static;
use regex::Regex;

use ph_core::constants::{validation, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use ph_core::error::{PhError, PhResult};

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^https?://[^\s]+$").unwrap();
}

pub fn username(raw: &str) -> PhResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if len < validation::USERNAME_MIN_LEN || len > validation::USERNAME_MAX_LEN {
        return Err(PhError::validation(format!(
            "username must be {}-{} characters",
            validation::USERNAME_MIN_LEN,
            validation::USERNAME_MAX_LEN
        )));
    }
    if !USERNAME_RE.is_match(name) {
        return Err(PhError::validation(
            "username may only contain letters, numbers and underscores",
        ));
    }
    Ok(name.to_string())
}

/// Emails are trimmed and lowercased.
pub fn email(raw: &str) -> PhResult<String> {
    let email = raw.trim().to_lowercase();
    if email.len() > validation::EMAIL_MAX_LEN || !EMAIL_RE.is_match(&email) {
        return Err(PhError::validation("invalid email address"));
    }
    Ok(email)
}

pub fn password(raw: &str, min_len: usize) -> PhResult<()> {
    let len = raw.chars().count();
    if len < min_len {
        return Err(PhError::validation(format!(
            "password must be at least {min_len} characters"
        )));
    }
    if len > validation::PASSWORD_MAX_LEN {
        return Err(PhError::validation("password is too long"));
    }
    Ok(())
}

/// Required trimmed text within bounds.
pub fn text(field: &str, raw: &str, min: usize, max: usize) -> PhResult<String> {
    let value = raw.trim();
    let len = value.chars().count();
    if len < min.max(1) {
        return Err(PhError::validation(format!("{field} is required")));
    }
    if len < min {
        return Err(PhError::validation(format!("{field} must be at least {min} characters")));
    }
    if len > max {
        return Err(PhError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_string())
}

/// Optional trimmed text; empty becomes `None`.
pub fn optional_text(field: &str, raw: Option<&str>, max: usize) -> PhResult<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.chars().count() > max => Err(PhError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        Some(value) => Ok(Some(value.to_string())),
    }
}

/// Empty is allowed (it clears the field); anything else must be http(s).
pub fn optional_url(field: &str, raw: &str) -> PhResult<()> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > validation::URL_MAX_LEN || !URL_RE.is_match(value) {
        return Err(PhError::validation(format!("{field} must be an http(s) URL")));
    }
    Ok(())
}

/// Resolve a 1-based page and page size into (page, limit, offset).
pub fn page(page: Option<u32>, limit: Option<i64>) -> (u32, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page as i64 - 1) * limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert_eq!(username("  kofi_1 ").unwrap(), "kofi_1");
        assert!(username("ab").is_err());
        assert!(username("has space").is_err());
        assert!(username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(email(" Ama@Example.COM ").unwrap(), "ama@example.com");
        assert!(email("not-an-email").is_err());
        assert!(email("a@b").is_err());
    }

    #[test]
    fn test_text_bounds() {
        assert!(text("content", "   ", 5, 10).is_err());
        assert!(text("content", "abc", 5, 10).is_err());
        assert!(text("content", "abcdefghijk", 5, 10).is_err());
        assert_eq!(text("content", " hello ", 5, 10).unwrap(), "hello");
        assert_eq!(optional_text("origin", Some("  "), 10).unwrap(), None);
        assert!(optional_text("origin", Some("too long here"), 5).is_err());
    }

    #[test]
    fn test_urls() {
        assert!(optional_url("website", "").is_ok());
        assert!(optional_url("website", "https://proverbs.example").is_ok());
        assert!(optional_url("website", "javascript:alert(1)").is_err());
    }

    #[test]
    fn test_paging() {
        assert_eq!(page(None, None), (1, 20, 0));
        assert_eq!(page(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page(Some(0), Some(1000)), (1, 100, 0));
    }
}
