//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

use crate::api::DEFAULT_URL;

/// Deck command-line client
///
/// Manage extensions, run allowlisted commands and read the activity log of a
/// running deck-server.
#[derive(Parser, Debug)]
#[command(name = "deck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// deck-server base URL
    #[arg(long, global = true, env = "DECK_URL", default_value = DEFAULT_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extension management (list, enable, disable, create)
    Ext(ExtCommand),

    /// Run a command through the server's terminal endpoint
    Exec {
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show recent activity log entries
    Logs {
        /// Number of entries
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show server status
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show version
    Version,
}

#[derive(Args, Debug)]
pub struct ExtCommand {
    #[command(subcommand)]
    pub action: ExtAction,
}

#[derive(Subcommand, Debug)]
pub enum ExtAction {
    /// List discovered extensions
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Enable and activate an extension
    Enable {
        /// Extension ID
        id: String,
    },

    /// Deactivate and disable an extension
    Disable {
        /// Extension ID
        id: String,
    },

    /// Scaffold a new (disabled) extension
    Create {
        /// Extension ID (letters, digits and underscores)
        id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Author
        #[arg(short, long)]
        author: Option<String>,
    },
}
