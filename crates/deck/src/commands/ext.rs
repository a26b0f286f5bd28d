//! Extension management commands.
//!
//! List, enable, disable and create extensions through the server API.

use anyhow::{bail, Result};
use colored::{ColoredString, Colorize};

use crate::api::{ApiClient, CreateRequest, Extension, ToggleResult};
use crate::cli::{ExtAction, ExtCommand};

/// Execute extension command.
pub async fn execute(cmd: ExtCommand, api: &ApiClient) -> Result<()> {
    match cmd.action {
        ExtAction::List { json } => list(json, api).await,
        ExtAction::Enable { id } => toggle(&id, true, api).await,
        ExtAction::Disable { id } => toggle(&id, false, api).await,
        ExtAction::Create {
            id,
            name,
            description,
            author,
        } => {
            let request = CreateRequest {
                id,
                name,
                description,
                author,
            };
            create(&request, api).await
        }
    }
}

fn state_icon(ext: &Extension) -> ColoredString {
    match (ext.enabled, ext.loaded) {
        (true, true) => "●".green(),
        (true, false) => "✗".red(),
        (false, _) => "○".yellow(),
    }
}

/// List discovered extensions.
async fn list(json: bool, api: &ApiClient) -> Result<()> {
    let extensions = api.list_extensions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extensions)?);
        return Ok(());
    }

    if extensions.is_empty() {
        println!("{}", "No extensions installed.".yellow());
        println!("  Use {} to scaffold one.", "deck ext create".cyan());
        return Ok(());
    }

    println!("{}", "Extensions".bold());
    println!("{}", "═".repeat(60));

    for ext in &extensions {
        println!(
            "{} {} {} {}",
            state_icon(ext),
            ext.name.bold(),
            format!("v{}", ext.version).dimmed(),
            format!("({})", ext.id).dimmed()
        );
        if !ext.description.is_empty() {
            println!("  {}", ext.description);
        }
        if ext.enabled && !ext.loaded {
            println!("  {} enabled but not loaded", "Warning:".red());
        }
    }

    println!();
    Ok(())
}

async fn toggle(id: &str, enabled: bool, api: &ApiClient) -> Result<()> {
    let result = api.toggle_extension(id, enabled).await?;
    report_toggle(&result)
}

fn report_toggle(result: &ToggleResult) -> Result<()> {
    if let Some(code) = &result.error {
        bail!(
            "Extension {} was {} but failed to {} ({})",
            result.id,
            if result.enabled { "enabled" } else { "disabled" },
            if result.enabled { "load" } else { "unload" },
            code
        );
    }

    if result.enabled {
        println!("{} Extension {} enabled and loaded", "✓".green(), result.id.bold());
    } else {
        println!("{} Extension {} disabled", "✓".green(), result.id.bold());
    }
    Ok(())
}

async fn create(request: &CreateRequest, api: &ApiClient) -> Result<()> {
    let created = api.create_extension(request).await?;

    println!("{} {}", "✓".green(), created.message);
    println!("  {} {}", "ID:".cyan(), created.id);
    println!("  {} {}", "Name:".cyan(), created.name);
    println!();
    println!("Enable it with: {}", format!("deck ext enable {}", created.id).cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle_result(enabled: bool, error: Option<&str>) -> ToggleResult {
        ToggleResult {
            id: "weather".into(),
            enabled,
            loaded: enabled && error.is_none(),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_report_toggle_success() {
        assert!(report_toggle(&toggle_result(true, None)).is_ok());
        assert!(report_toggle(&toggle_result(false, None)).is_ok());
    }

    #[test]
    fn test_report_toggle_activation_failure() {
        let err = report_toggle(&toggle_result(true, Some("MISSING_HOOK"))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to load"));
        assert!(message.contains("MISSING_HOOK"));
    }
}
