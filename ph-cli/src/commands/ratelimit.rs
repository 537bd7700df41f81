//! Rate limiter commands.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;
use ph_services::{Limiter, RateLimiter};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum RateLimitAction {
    /// List the limiters and their windows.
    List,
    /// Run one check against a limiter. The check counts as a request.
    Check {
        /// Identifier, e.g. `ip:203.0.113.9` or `email:someone@example.com`.
        identifier: String,
        /// Limiter name.
        #[arg(short, long, default_value = "login")]
        limiter: String,
    },
}

pub async fn run(config: ConfigHandle, action: RateLimitAction, format: OutputFormat) -> PhResult<()> {
    match action {
        RateLimitAction::List => match format {
            OutputFormat::Json => {
                let limiters: Vec<_> = Limiter::ALL
                    .into_iter()
                    .map(|l| {
                        serde_json::json!({
                            "name": l.name(),
                            "limit": l.limit(),
                            "window_secs": l.window().as_secs(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&limiters)?);
            }
            OutputFormat::Text => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .apply_modifier(UTF8_ROUND_CORNERS)
                    .set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Limiter", "Requests", "Window"]);
                for limiter in Limiter::ALL {
                    table.add_row(vec![
                        limiter.name().to_string(),
                        limiter.limit().to_string(),
                        format_window(limiter.window().as_secs()),
                    ]);
                }
                println!("{table}");
            }
        },
        RateLimitAction::Check { identifier, limiter } => {
            let limiter: Limiter = limiter.parse()?;
            let enabled = config.read().await.rate_limit.enabled;
            let store = super::open_store(&config).await?;
            let result = RateLimiter::new(store, enabled)
                .check_rate_limit(&identifier, limiter)
                .await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
                OutputFormat::Text => {
                    let verdict = if result.success {
                        style("ALLOWED").green().bold()
                    } else {
                        style("DENIED").red().bold()
                    };
                    println!("  {verdict} {identifier} on {}", limiter.name());
                    println!("  Remaining: {}/{}", result.remaining, result.limit);
                    if let Some(reset) = chrono::DateTime::from_timestamp_millis(result.reset) {
                        println!("  Resets:    {}", reset.format("%Y-%m-%d %H:%M:%S UTC"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn format_window(secs: u64) -> String {
    if secs % 3600 == 0 {
        format!("{} h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_window() {
        assert_eq!(format_window(900), "15 min");
        assert_eq!(format_window(3600), "1 h");
        assert_eq!(format_window(45), "45 s");
    }
}
