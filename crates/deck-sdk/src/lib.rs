//! Deck SDK - extension subsystem
//!
//! Discovery, validation, loading and route registration of the optional
//! feature modules a Deck host serves under `/api/ext/{id}`.
//!
//! # Modules
//!
//! - **extensions** - manifests, code units, module catalog, route table,
//!   loader and the lifecycle manager
//!
//! Native modules implement [`ExtensionModule`] and are registered in a
//! [`ModuleCatalog`] under the name their `extension.toml` refers to.

pub mod extensions;

// Re-export core types extension authors need
pub use deck_core::{ActivityLog, ActivityStatus};

pub use async_trait::async_trait;

pub use extensions::{
    ExtensionError, ExtensionManager, ExtensionManifest, ExtensionModule, ExtensionResult,
    ExtensionSummary, ModuleCatalog, NewExtension, RouteGroup, RouteTable, ToggleOutcome,
};
