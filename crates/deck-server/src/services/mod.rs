//! Service layer for deck-server
//!
//! Clients for the collaborators the panel talks to.

pub mod ollama;

pub use ollama::{OllamaError, OllamaService, ServerStatus};
