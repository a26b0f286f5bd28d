//! deck-core - Core library for Deck
//!
//! This crate provides shared functionality between the deck CLI and deck-server:
//!
//! - **command**: Allowlist/denylist admission policy for terminal commands
//! - **runner**: Policy-gated command execution with a timeout
//! - **activity**: Append-only operator activity log

pub mod activity;
pub mod command;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use activity::{ActivityEntry, ActivityLog, ActivityStatus};
pub use command::{Admission, CommandPolicy, Denial};
pub use error::{Error, Result};
pub use runner::{CommandOutput, CommandRunner};
