//! Terminal command execution.

use anyhow::Result;
use colored::Colorize;

use crate::api::ApiClient;

/// Run `command` on the server and print its output.
///
/// Returns an error when the server reports the command as failed so the
/// process exit status reflects it.
pub async fn execute(command: &[String], api: &ApiClient) -> Result<()> {
    let command = command.join(" ");
    let result = api.execute(&command).await?;

    if result.error {
        eprint!("{}", result.output.red());
        if !result.output.ends_with('\n') {
            eprintln!();
        }
        anyhow::bail!("Command failed: {}", command);
    }

    print!("{}", result.output);
    Ok(())
}
