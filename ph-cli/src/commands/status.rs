//! Status command - query a running server's health endpoint.

use std::time::{Duration, Instant};

use console::style;
use serde_json::Value;

use ph_core::config::ConfigHandle;
use ph_core::error::{PhError, PhResult};
use crate::OutputFormat;

pub async fn run(config: ConfigHandle, url: Option<String>, format: OutputFormat) -> PhResult<()> {
    let base = match url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let cfg = config.read().await;
            let host = match cfg.server.bind_address.as_str() {
                "0.0.0.0" | "::" => "127.0.0.1",
                other => other,
            };
            format!("http://{host}:{}", cfg.server.port)
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| PhError::Other(anyhow::Error::new(e).context("failed to build http client")))?;

    let start = Instant::now();
    let response = client.get(format!("{base}/api/health")).send().await;
    let latency_ms = start.elapsed().as_millis();

    let (reachable, http_status, report) = match response {
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.json::<Value>().await.ok();
            (true, Some(status), body)
        }
        Err(e) => {
            tracing::debug!("health request failed: {e}");
            (false, None, None)
        }
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "url": base,
                "reachable": reachable,
                "latency_ms": latency_ms,
                "http_status": http_status,
                "health": report,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("{}", style("Server").bold().underlined());
            println!("  URL:       {base}");
            if !reachable {
                println!("  Status:    {}", style("unreachable").red());
                return Ok(());
            }
            let report = report.unwrap_or(Value::Null);
            let status = report["status"].as_str().unwrap_or("unknown");
            let styled = match status {
                "ok" => style(status).green(),
                "degraded" => style(status).yellow(),
                _ => style(status).red(),
            };
            println!("  Status:    {styled} ({latency_ms}ms)");
            if let Some(version) = report["version"].as_str() {
                println!("  Version:   {version}");
            }
            if let Some(host) = report["host"].as_str() {
                println!("  Host:      {host}");
            }

            println!();
            println!("{}", style("Components").bold().underlined());
            for key in ["database", "cache"] {
                print_component(&report[key]);
            }
            if let Some(services) = report["services"].as_array() {
                for service in services {
                    print_component(service);
                }
            }
        }
    }

    Ok(())
}

fn print_component(component: &Value) {
    let Some(name) = component["name"].as_str() else {
        return;
    };
    let marker = if component["healthy"].as_bool().unwrap_or(false) {
        style("OK").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    match component["detail"].as_str() {
        Some(detail) => println!("  {marker} {name} ({detail})"),
        None => println!("  {marker} {name}"),
    }
}
