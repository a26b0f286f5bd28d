//! Server status command.
//!
//! Combines `/health` with the extension list. Supports JSON output for
//! programmatic use.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::api::{ApiClient, Extension, Health};

/// Full status for JSON output.
#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub url: String,
    pub health: Health,
    pub loaded_extensions: Vec<String>,
}

pub async fn execute(json: bool, api: &ApiClient) -> Result<()> {
    let health = api.health().await?;
    let extensions = api.list_extensions().await?;
    let status = ServerStatus {
        url: api.base_url().to_string(),
        health,
        loaded_extensions: loaded_ids(&extensions),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_dashboard(&status);
    }
    Ok(())
}

fn loaded_ids(extensions: &[Extension]) -> Vec<String> {
    extensions
        .iter()
        .filter(|e| e.loaded)
        .map(|e| e.id.clone())
        .collect()
}

fn format_uptime(seconds: u64) -> String {
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let minutes = rest / 60;
    match (days, hours) {
        (0, 0) => format!("{}m {}s", minutes, rest % 60),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h", days, hours),
    }
}

fn print_dashboard(status: &ServerStatus) {
    let health = &status.health;

    println!("{}", "Deck Status".bold());
    println!("{}", "═".repeat(60));
    println!("  {} {}", "Server:".cyan(), status.url);
    println!(
        "  {} {} (v{}, host {})",
        "Health:".cyan(),
        if health.status == "ok" {
            health.status.green()
        } else {
            health.status.red()
        },
        health.version,
        health.host
    );
    println!("  {} {}", "Uptime:".cyan(), format_uptime(health.uptime_seconds));
    println!(
        "  {} {} known, {} loaded",
        "Extensions:".cyan(),
        health.extensions.known,
        health.extensions.loaded
    );
    for id in &status.loaded_extensions {
        println!("    {} {}", "●".green(), id);
    }
}
