//! Global error types for Proverb Hub.
//!
//! All error categories across the application are unified into a single
//! `PhError` enum. The request-facing variants (validation, authentication,
//! authorization, not-found, rate-limit) carry a fixed HTTP status code and a
//! stable label that is surfaced to clients.

use thiserror::Error;

/// Convenience type alias for Results using PhError.
pub type PhResult<T> = Result<T, PhError>;

/// Unified error type covering all error categories in Proverb Hub.
#[derive(Error, Debug)]
pub enum PhError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Database errors --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    // -- Key-value store errors --
    /// The cache / rate-limit store failed.
    #[error("store error: {0}")]
    Store(String),

    // -- Request errors --
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// No valid session was presented.
    #[error("{0}")]
    Authentication(String),

    /// The caller is authenticated but not allowed to do this.
    #[error("{0}")]
    Authorization(String),

    /// The requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A named limiter rejected the request.
    #[error("too many requests, try again later")]
    RateLimited {
        /// Maximum requests allowed in the window.
        limit: u32,
        /// Requests left in the window (always 0 when rejected).
        remaining: u32,
        /// Epoch milliseconds at which the window resets.
        reset: i64,
    },

    /// The write conflicts with existing data (duplicate username, email...).
    #[error("{0}")]
    Conflict(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Service errors --
    /// A service failed to initialize.
    #[error("service init error: {0}")]
    ServiceInit(String),

    /// A service is not yet initialized.
    #[error("service not initialized: {0}")]
    ServiceNotInitialized(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PhError {
    /// HTTP status code this error maps to when surfaced to a client.
    pub fn status_code(&self) -> u16 {
        match self {
            PhError::Validation(_) => 400,
            PhError::Authentication(_) => 401,
            PhError::Authorization(_) => 403,
            PhError::NotFound(_) => 404,
            PhError::Conflict(_) => 409,
            PhError::RateLimited { .. } => 429,
            _ => 500,
        }
    }

    /// Stable taxonomy label for this error.
    pub fn label(&self) -> &'static str {
        match self {
            PhError::Validation(_) => "ValidationError",
            PhError::Authentication(_) => "AuthenticationError",
            PhError::Authorization(_) => "AuthorizationError",
            PhError::NotFound(_) => "NotFoundError",
            PhError::RateLimited { .. } => "RateLimitError",
            PhError::Conflict(_) => "ConflictError",
            _ => "InternalError",
        }
    }

    /// Whether the error is caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        PhError::Validation(msg.into())
    }

    /// Shorthand for a missing-session failure.
    pub fn unauthenticated() -> Self {
        PhError::Authentication("authentication required".into())
    }

    /// Shorthand for a permission failure.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        PhError::Authorization(msg.into())
    }

    /// Shorthand for a missing entity.
    pub fn not_found(what: impl Into<String>) -> Self {
        PhError::NotFound(what.into())
    }
}

impl From<serde_json::Error> for PhError {
    fn from(e: serde_json::Error) -> Self {
        PhError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PhError {
    fn from(e: toml::de::Error) -> Self {
        PhError::Config(e.to_string())
    }
}
