//! Extension System
//!
//! Plugin architecture for optional feature modules that add HTTP routes to
//! the host at runtime.
//!
//! Each extension lives in its own subdirectory of the extension root with a
//! `manifest.json` and an `extension.toml` code unit:
//!
//! ```text
//! extensions/
//! ├── system_monitor/
//! │   ├── manifest.json
//! │   └── extension.toml
//! └── _disabled_scratch/      (ignored)
//! ```
//!
//! The [`ExtensionManager`] owns the lifecycle:
//!
//! ```rust,no_run
//! use deck_core::ActivityLog;
//! use deck_sdk::extensions::{ExtensionManager, ModuleCatalog};
//! use std::sync::Arc;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let activity = Arc::new(ActivityLog::in_memory());
//!     let manager = ExtensionManager::new("extensions", ModuleCatalog::new(), activity);
//!
//!     manager.startup().await?;
//!     let outcome = manager.toggle("system_monitor", true).await?;
//!     assert!(outcome.loaded);
//!     Ok(())
//! }
//! ```

mod loader;
mod manager;
mod native;
mod registry;
mod routes;
mod scaffold;
mod types;
mod unit;

pub use loader::{ExtensionLoader, LoadedExtension};
pub use manager::{ExtensionManager, StartupReport};
pub use native::{module_from_raw, CreateFn, LibraryCache, CREATE_SYMBOL};
pub use registry::{Discovery, ExtensionRegistry, SkippedCandidate};
pub use routes::{RouteGroup, RouteTable, EXTENSION_ROUTE_PREFIX};
pub use scaffold::{
    scaffold_unit, validate_extension_id, write_scaffold, NewExtension, SCAFFOLD_VERSION,
};
pub use types::{
    ExtensionDescriptor, ExtensionError, ExtensionManifest, ExtensionResult, ExtensionSummary,
    ToggleOutcome, ENTRY_POINT_FILE, MANIFEST_FILE,
};
pub use unit::{
    CodeUnit, DeclarativeModule, ExtensionModule, HookSpec, ModuleCatalog, ModuleFactory,
    RouteMethod, RouteSpec,
};
