//! Command implementations for deck CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod exec;
pub mod ext;
pub mod logs;
pub mod status;
