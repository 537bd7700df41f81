//! Host directories and identity.

use std::path::PathBuf;
use crate::error::{PhError, PhResult};

/// Overrides both the data and config directories when set.
pub const HOME_ENV: &str = "PROVERB_HUB_HOME";

const APP_DIR: &str = "proverb-hub";

pub struct Platform;

impl Platform {
    /// Directory for the database and log files.
    ///
    /// `$PROVERB_HUB_HOME` if set, otherwise the user data directory
    /// (`~/.local/share/proverb-hub` on Linux).
    pub fn data_dir() -> PhResult<PathBuf> {
        Self::resolve(dirs::data_dir(), "data")
    }

    /// Directory holding `config.toml`.
    pub fn config_dir() -> PhResult<PathBuf> {
        Self::resolve(dirs::config_dir(), "config")
    }

    fn resolve(base: Option<PathBuf>, kind: &str) -> PhResult<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        base.map(|b| b.join(APP_DIR))
            .ok_or_else(|| PhError::Config(format!("could not determine {kind} directory; set {HOME_ENV}")))
    }

    /// Hostname reported by the health endpoint.
    pub fn hostname() -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_app_dir() {
        if std::env::var_os(HOME_ENV).is_some() {
            return;
        }
        let dir = Platform::resolve(Some(PathBuf::from("/var/lib")), "data").unwrap();
        assert_eq!(dir, PathBuf::from("/var/lib/proverb-hub"));
        assert!(Platform::resolve(None, "data").is_err());
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!Platform::hostname().is_empty());
    }
}
