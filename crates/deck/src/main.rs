//! deck - command-line client for deck-server
//!
//! Extension management, allowlisted command execution and the activity log
//! over the server's HTTP API.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod cli;
mod commands;
mod error;

use api::ApiClient;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("deck=warn".parse()?))
        .init();

    let cli = Cli::parse();
    tracing::debug!("Using server {}", cli.url);

    if let Commands::Version = cli.command {
        println!("deck {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let api = ApiClient::new(&cli.url)?;

    // Execute command
    match cli.command {
        Commands::Ext(cmd) => commands::ext::execute(cmd, &api).await,
        Commands::Exec { command } => commands::exec::execute(&command, &api).await,
        Commands::Logs { limit, json } => commands::logs::execute(limit, json, &api).await,
        Commands::Status { json } => commands::status::execute(json, &api).await,
        Commands::Version => Ok(()),
    }
}
