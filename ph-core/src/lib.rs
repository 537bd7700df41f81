//! Proverb Hub Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Proverb Hub crates:
//! - Application configuration (server, database, cache, rate limits, auth)
//! - The application error taxonomy with HTTP status mapping
//! - Structured logging with tracing
//! - Platform directory resolution
//! - Policy constants (cache TTLs, limiter windows, validation limits)

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{PhError, PhResult};
pub use logging::init_logging;
pub use platform::Platform;
