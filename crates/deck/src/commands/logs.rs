//! Activity log view.

use anyhow::Result;
use colored::{ColoredString, Colorize};

use crate::api::{ApiClient, LogEntry};

pub async fn execute(limit: usize, json: bool, api: &ApiClient) -> Result<()> {
    let entries = api.logs(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No activity recorded.".yellow());
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} {} {} {}",
            short_timestamp(&entry.timestamp).dimmed(),
            status_label(entry),
            entry.action.bold(),
            entry.details
        );
    }
    Ok(())
}

fn status_label(entry: &LogEntry) -> ColoredString {
    let label = format!("{:<7}", entry.status);
    match entry.status.as_str() {
        "success" => label.green(),
        "warning" => label.yellow(),
        "error" => label.red(),
        _ => label.blue(),
    }
}

/// `YYYY-MM-DD HH:MM:SS` from an RFC 3339 timestamp
fn short_timestamp(timestamp: &str) -> String {
    let trimmed: String = timestamp.chars().take(19).collect();
    trimmed.replacen('T', " ", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_timestamp() {
        assert_eq!(
            short_timestamp("2026-03-14T09:26:53.589793+01:00"),
            "2026-03-14 09:26:53"
        );
        assert_eq!(short_timestamp("garbage"), "garbage");
    }
}
