//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr; a second layer writes a daily-rotated
//! `proverb-hub.log` (plain text or JSON) under the configured directory.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::rolling;

use crate::error::PhResult;

/// Directives appended to a bare level so connection-pool and HTTP-stack
/// chatter stays out of debug output.
const QUIET_DEPENDENCIES: &str = "hyper=warn,h2=warn,r2d2=warn,redis=warn";

/// Turn a configured level into a filter directive. A bare level such as
/// `debug` gets [`QUIET_DEPENDENCIES`] appended; a full directive like
/// `ph_api=trace,info` is used unchanged.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return format!("info,{QUIET_DEPENDENCIES}");
    }
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{level},{QUIET_DEPENDENCIES}")
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directive(level)).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> PhResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "proverb-hub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console_layer);

    if json_output {
        registry
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true),
            )
            .init();
    }

    tracing::info!("logging to {} (level {level})", log_dir.display());

    Ok(LogGuard { _guard: guard })
}

/// Flushes the file writer on drop.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Console-only logger for tests. Safe to call repeatedly.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("debug"), format!("debug,{QUIET_DEPENDENCIES}"));
        assert_eq!(filter_directive(""), format!("info,{QUIET_DEPENDENCIES}"));
        assert_eq!(filter_directive("ph_api=trace,info"), "ph_api=trace,info");
    }

    #[test]
    fn test_console_logging_is_idempotent() {
        init_console_logging("debug");
        init_console_logging("not a directive ===");
    }
}
