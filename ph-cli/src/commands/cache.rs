//! Cache inspection commands.

use clap::Subcommand;
use console::style;

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;
use ph_models::queries::FeedFilter;
use ph_services::cache::keys;
use ph_services::CacheService;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum CacheAction {
    /// Print the cache keys used for a user, feed page or leaderboard.
    Keys {
        /// Username for the profile key.
        #[arg(short, long)]
        username: Option<String>,
        /// Feed page.
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Feed filter (latest, popular).
        #[arg(long, default_value = "latest")]
        filter: String,
        /// Leaderboard size.
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Print the cached value under a key.
    Get { key: String },
    /// Remove a cached value.
    Delete { key: String },
}

pub async fn run(config: ConfigHandle, action: CacheAction, format: OutputFormat) -> PhResult<()> {
    match action {
        CacheAction::Keys { username, page, filter, limit } => {
            let filter: FeedFilter = serde_json::from_value(serde_json::Value::String(filter))?;
            let mut built = vec![
                ("feed", keys::feed(page, filter.as_str())),
                ("leaderboard", keys::leaderboard(limit)),
            ];
            if let Some(username) = username.as_deref() {
                built.insert(0, ("profile", keys::profile(username)));
            }

            match format {
                OutputFormat::Json => {
                    let map: serde_json::Map<String, serde_json::Value> = built
                        .into_iter()
                        .map(|(name, key)| (name.to_string(), serde_json::Value::String(key)))
                        .collect();
                    println!("{}", serde_json::Value::Object(map));
                }
                OutputFormat::Text => {
                    for (name, key) in built {
                        println!("  {:<12} {key}", style(name).dim());
                    }
                }
            }
        }
        CacheAction::Get { key } => {
            let store = open_shared_store(&config).await?;
            let value = store.get(&key).await?;
            match (format, value) {
                (OutputFormat::Json, value) => {
                    let parsed = value
                        .as_deref()
                        .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok());
                    println!("{}", serde_json::json!({"key": key, "value": parsed}));
                }
                (OutputFormat::Text, Some(value)) => {
                    match serde_json::from_str::<serde_json::Value>(&value) {
                        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                        Err(_) => println!("{value}"),
                    }
                }
                (OutputFormat::Text, None) => {
                    println!("  {} {key} is not cached.", style("MISS").yellow().bold());
                }
            }
        }
        CacheAction::Delete { key } => {
            let store = open_shared_store(&config).await?;
            let cache = CacheService::new(store);
            let removed = cache.delete(&key).await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({"key": key, "removed": removed})),
                OutputFormat::Text if removed => println!("  {} Removed {key}.", style("OK").green().bold()),
                OutputFormat::Text => println!("  Nothing cached under {key}."),
            }
        }
    }

    Ok(())
}

async fn open_shared_store(
    config: &ConfigHandle,
) -> PhResult<std::sync::Arc<dyn ph_services::KeyValueStore>> {
    if !config.read().await.uses_redis() {
        println!(
            "  {} No redis url configured; the in-process store of a running server is not reachable from here.",
            style("NOTE").cyan().bold()
        );
    }
    super::open_store(config).await
}
