//! Log search over the `application_logs` table.

use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;
use ph_models::queries::LogQuery;
use ph_models::LogLevel;
use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    level: Option<String>,
    page: i64,
    limit: i64,
    search: Option<String>,
    format: OutputFormat,
) -> PhResult<()> {
    let level = match level.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(level) => Some(level.parse::<LogLevel>()?),
    };
    let query = LogQuery { level, search, page, limit };

    let registry = super::init_registry(&config).await?;
    let result = registry.audit.query_logs(&query)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if result.logs.is_empty() {
                println!("  No log entries match.");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Time", "Level", "User", "Message"]);

            for entry in &result.logs {
                let level = entry.level.as_str();
                let level = match entry.level {
                    LogLevel::Error => style(level).red().to_string(),
                    LogLevel::Warn => style(level).yellow().to_string(),
                    LogLevel::Debug => style(level).dim().to_string(),
                    LogLevel::Info => level.to_string(),
                };
                table.add_row(vec![
                    entry.created_at.clone(),
                    level,
                    entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
                    super::truncate(&entry.message, 80),
                ]);
            }
            println!("{table}");
            println!(
                "\n  --- page {} of {} ({} entries) ---",
                result.page, result.total_pages, result.total
            );
        }
    }

    Ok(())
}
