//! Proverb Hub CLI - run and operate a Proverb Hub server.
//!
//! `proverbs serve` starts the HTTP server. The other commands work against
//! the same database and key-value store directly, for maintenance from a
//! shell on the host.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use ph_core::config::{AppConfig, ConfigHandle};
use ph_core::error::PhResult;
use ph_core::logging;

/// Proverb Hub - share and discover proverbs.
#[derive(Parser)]
#[command(
    name = "proverbs",
    version,
    about = "Proverb Hub server and admin CLI",
    long_about = "Run the Proverb Hub HTTP server and administer its database,\n\
                  cache and rate limiters from the command line."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
        /// Interface to bind (overrides config).
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Query a running server's health endpoint.
    Status {
        /// Base URL of the server. Defaults to the configured listen address.
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Database management commands.
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
    /// Search the application log table.
    Logs {
        /// Minimum level (debug, info, warn, error) or "all".
        #[arg(short, long)]
        level: Option<String>,
        /// Page number, starting at 1.
        #[arg(short, long, default_value = "1")]
        page: i64,
        /// Entries per page.
        #[arg(short = 'n', long, default_value = "50")]
        limit: i64,
        /// Substring to match in messages.
        #[arg(short, long)]
        search: Option<String>,
    },
    /// User administration.
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
    },
    /// Inspect the cache.
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
    /// Inspect rate limiters.
    #[command(name = "ratelimit")]
    RateLimit {
        #[command(subcommand)]
        action: commands::ratelimit::RateLimitAction,
    },
    /// View and create configuration files.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> PhResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(std::path::PathBuf::from);
    let mut config = match &config_path {
        Some(path) => AppConfig::load_from_file(path)?,
        None => {
            let default_path = AppConfig::default_config_path()?;
            if default_path.exists() {
                AppConfig::load_from_file(&default_path)?
            } else {
                AppConfig::default()
            }
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_dir = config.effective_log_dir()?;
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    let config_handle = ConfigHandle::new(config);

    info!("Proverb Hub CLI v{}", ph_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve { port, bind } => commands::serve::run(config_handle, port, bind).await,
        Commands::Status { url } => commands::status::run(config_handle, url, cli.format).await,
        Commands::Db { action } => commands::db::run(config_handle, action, cli.format).await,
        Commands::Logs { level, page, limit, search } => {
            commands::logs::run(config_handle, level, page, limit, search, cli.format).await
        }
        Commands::Admin { action } => commands::admin::run(config_handle, action, cli.format).await,
        Commands::Cache { action } => commands::cache::run(config_handle, action, cli.format).await,
        Commands::RateLimit { action } => {
            commands::ratelimit::run(config_handle, action, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, config_path, action, cli.format).await
        }
    }
}
