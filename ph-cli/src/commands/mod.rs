//! CLI command implementations.

pub mod admin;
pub mod cache;
pub mod config;
pub mod db;
pub mod logs;
pub mod ratelimit;
pub mod serve;
pub mod status;

use std::sync::Arc;

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;
use ph_models::Database;
use ph_services::store::{connect_store, KeyValueStore};
use ph_services::ServiceRegistry;

/// Helper to open the configured database.
pub async fn init_database(config: &ConfigHandle) -> PhResult<Database> {
    let cfg = config.read().await;
    let db_path = cfg.effective_db_path()?;
    Database::init(&db_path, &cfg.database)
}

/// Helper to connect the configured key-value store.
pub async fn open_store(config: &ConfigHandle) -> PhResult<Arc<dyn KeyValueStore>> {
    let cfg = config.snapshot().await;
    connect_store(&cfg.cache.redis_url, &cfg.cache.key_prefix).await
}

/// Build and initialize every service on the configured database and store.
pub async fn init_registry(config: &ConfigHandle) -> PhResult<Arc<ServiceRegistry>> {
    let database = init_database(config).await?;
    let cfg = config.snapshot().await;
    let registry = ServiceRegistry::build(&cfg, database).await?;
    registry.init_all()?;
    Ok(Arc::new(registry))
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncate to `max_chars` characters, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
