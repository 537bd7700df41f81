//! Database management commands.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;
use dialoguer::Confirm;

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum DbAction {
    /// Create the database and apply migrations.
    Init,
    /// Show row counts and file sizes.
    Stats,
    /// Run an integrity check.
    Check,
    /// Reset the database (WARNING: destroys all data).
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Delete expired sessions and old application logs.
    Prune {
        /// Keep application logs newer than this many days.
        #[arg(long, default_value = "30")]
        log_days: i64,
    },
}

pub async fn run(config: ConfigHandle, action: DbAction, format: OutputFormat) -> PhResult<()> {
    let db_path = config.read().await.effective_db_path()?;

    match action {
        DbAction::Init => {
            super::init_database(&config).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({"path": db_path.display().to_string(), "ready": true}));
                }
                OutputFormat::Text => {
                    println!("  {} Database ready at {}", style("OK").green().bold(), db_path.display());
                }
            }
        }
        DbAction::Stats => {
            let db = super::init_database(&config).await?;
            let stats = db.stats()?;
            let file_size = std::fs::metadata(&db_path).ok().map(|m| m.len());
            let wal_size = std::fs::metadata(db_path.with_extension("db-wal")).ok().map(|m| m.len());

            let conn = db.conn()?;
            let journal_mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap_or_else(|_| "unknown".to_string());
            drop(conn);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "path": db_path.display().to_string(),
                        "tables": stats.tables,
                        "file_size_bytes": file_size,
                        "wal_size_bytes": wal_size,
                        "journal_mode": journal_mode,
                    }));
                }
                OutputFormat::Text => {
                    println!("{}", style("Database Statistics").bold().underlined());
                    println!("  Path:          {}", db_path.display());
                    println!("  Journal mode:  {}", journal_mode);
                    println!();

                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);

                    table.set_header(vec!["Table", "Row Count"]);
                    for count in &stats.tables {
                        table.add_row(vec![count.table.to_string(), count.rows.to_string()]);
                    }
                    println!("{table}");

                    println!();
                    println!("{}", style("Storage").bold().underlined());
                    if let Some(size) = file_size {
                        println!("  Database:      {}", super::format_bytes(size));
                    }
                    if let Some(size) = wal_size {
                        println!("  WAL file:      {}", super::format_bytes(size));
                    }
                }
            }
        }
        DbAction::Check => {
            println!("  {} Running integrity check...", style("...").dim());
            let db = super::init_database(&config).await?;
            match db.run_integrity_check() {
                Ok(()) => println!("  {} Integrity check passed.", style("OK").green().bold()),
                Err(e) => println!("  {} Integrity check failed: {}", style("FAIL").red().bold(), e),
            }

            let conn = db.conn()?;
            let mut stmt = conn
                .prepare("PRAGMA foreign_key_check")
                .map_err(ph_models::map_db_err)?;
            let violations: Vec<String> = stmt
                .query_map([], |row| {
                    let table: String = row.get(0)?;
                    let rowid: i64 = row.get(1)?;
                    let parent: String = row.get(2)?;
                    Ok(format!("{table} row {rowid} -> {parent}"))
                })
                .map_err(ph_models::map_db_err)?
                .filter_map(|r| r.ok())
                .collect();

            if violations.is_empty() {
                println!("  {} Foreign key constraints OK.", style("OK").green().bold());
            } else {
                println!(
                    "  {} {} foreign key violation(s):",
                    style("WARN").yellow().bold(),
                    violations.len()
                );
                for v in violations.iter().take(10) {
                    println!("    - {v}");
                }
            }
        }
        DbAction::Reset { yes } => {
            println!("  {} This will delete ALL data.", style("WARNING").red().bold());
            println!("  Database: {}", db_path.display());

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("  Are you sure you want to reset the database?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);

            if !confirmed {
                println!("  Reset cancelled.");
                return Ok(());
            }

            let db = super::init_database(&config).await?;
            db.reset()?;
            println!("  {} Database reset complete.", style("OK").green().bold());
        }
        DbAction::Prune { log_days } => {
            let registry = super::init_registry(&config).await?;
            let sessions = registry.auth.purge_expired_sessions()?;
            let logs = registry.audit.prune_logs(log_days)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({"sessions": sessions, "logs": logs}));
                }
                OutputFormat::Text => {
                    println!(
                        "  {} Removed {sessions} expired session(s) and {logs} log entr{}.",
                        style("OK").green().bold(),
                        if logs == 1 { "y" } else { "ies" }
                    );
                }
            }
        }
    }

    Ok(())
}
