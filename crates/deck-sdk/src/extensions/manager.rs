//! Extension Manager
//!
//! Single owner of the descriptor catalog and the loaded-extension records.
//! Discovery, activation, deactivation and manifest writes all run under one
//! mutex, so an id is never activated twice and `list` never observes a
//! half-applied toggle. Request dispatch into bound route groups goes through
//! the [`RouteTable`] and does not take that mutex.

use deck_core::ActivityLog;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::loader::{ExtensionLoader, LoadedExtension};
use super::registry::ExtensionRegistry;
use super::routes::RouteTable;
use super::scaffold::{write_scaffold, NewExtension};
use super::types::*;
use super::unit::ModuleCatalog;

#[derive(Default)]
struct ManagerState {
    descriptors: BTreeMap<String, ExtensionDescriptor>,
    loaded: HashMap<String, LoadedExtension>,
}

/// Result of the startup sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub discovered: usize,
    pub activated: Vec<String>,
    /// `(id, error code)` of enabled extensions that failed to activate
    pub failed: Vec<(String, String)>,
}

/// Extension lifecycle owner
pub struct ExtensionManager {
    registry: ExtensionRegistry,
    loader: ExtensionLoader,
    routes: Arc<RouteTable>,
    activity: Arc<ActivityLog>,
    state: Mutex<ManagerState>,
}

impl ExtensionManager {
    pub fn new(root: impl Into<PathBuf>, catalog: ModuleCatalog, activity: Arc<ActivityLog>) -> Self {
        let root = root.into();
        let routes = Arc::new(RouteTable::new());
        Self {
            registry: ExtensionRegistry::new(root.clone()),
            loader: ExtensionLoader::new(root, catalog, routes.clone()),
            routes,
            activity,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.registry.root()
    }

    /// Live route table the host dispatches extension requests into
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.clone()
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        self.loader.catalog()
    }

    /// Rescan the extension root. Returns the number of known extensions.
    pub async fn discover(&self) -> ExtensionResult<usize> {
        let mut state = self.state.lock().await;
        self.rescan(&mut state).await?;
        Ok(state.descriptors.len())
    }

    pub async fn activate(&self, id: &str) -> ExtensionResult<()> {
        let mut state = self.state.lock().await;
        self.activate_locked(&mut state, id).await
    }

    pub async fn deactivate(&self, id: &str) -> ExtensionResult<()> {
        let mut state = self.state.lock().await;
        self.deactivate_locked(&mut state, id).await
    }

    /// Fresh scan, then every descriptor with its `loaded` flag, sorted by id
    pub async fn list(&self) -> ExtensionResult<Vec<ExtensionSummary>> {
        let mut state = self.state.lock().await;
        self.rescan(&mut state).await?;
        Ok(summaries(&state))
    }

    /// Persist a new `enabled` flag and activate or deactivate accordingly
    ///
    /// Unknown ids are looked up once more after a rescan before failing
    /// with not-found. Activation failures do not fail the toggle; they are
    /// reported through [`ToggleOutcome::error`].
    pub async fn toggle(&self, id: &str, enabled: bool) -> ExtensionResult<ToggleOutcome> {
        let mut state = self.state.lock().await;

        if !state.descriptors.contains_key(id) {
            self.rescan(&mut state).await?;
        }
        let directory = match state.descriptors.get(id) {
            Some(descriptor) => descriptor.directory.clone(),
            None => return Err(ExtensionError::NotFound(id.to_string())),
        };

        let manifest_path = self.registry.extension_dir(&directory).join(MANIFEST_FILE);
        let mut manifest = ExtensionManifest::load(&manifest_path).await?;
        manifest.enabled = enabled;
        manifest.save(&manifest_path).await?;

        if let Some(descriptor) = state.descriptors.get_mut(id) {
            descriptor.manifest.enabled = enabled;
        }
        self.activity.info(
            "toggle_extension",
            format!("{} extension {}", if enabled { "Enabled" } else { "Disabled" }, id),
        );

        let result = if enabled {
            self.activate_locked(&mut state, id).await
        } else {
            self.deactivate_locked(&mut state, id).await
        };

        Ok(ToggleOutcome {
            id: id.to_string(),
            enabled,
            loaded: state.loaded.contains_key(id),
            error: result.err().map(|e| e.code().to_string()),
        })
    }

    /// Scaffold a new, disabled extension and make it visible
    pub async fn create(&self, request: NewExtension) -> ExtensionResult<ExtensionSummary> {
        let request = request.normalized();
        request.validate()?;

        let mut state = self.state.lock().await;
        self.rescan(&mut state).await?;
        if state.descriptors.contains_key(&request.id) {
            return Err(ExtensionError::AlreadyExists(request.id));
        }

        self.registry.ensure_root().await?;
        write_scaffold(self.registry.root(), &request).await?;
        self.rescan(&mut state).await?;

        info!("Created extension {}", request.id);
        self.activity.success(
            "create_extension",
            format!("Created extension {} ({})", request.name, request.id),
        );

        state
            .descriptors
            .get(&request.id)
            .map(|d| d.summary(false))
            .ok_or(ExtensionError::NotFound(request.id))
    }

    /// Discover once and activate every enabled extension
    ///
    /// Individual failures are logged and collected; they never abort startup.
    pub async fn startup(&self) -> ExtensionResult<StartupReport> {
        let mut state = self.state.lock().await;
        self.registry.ensure_root().await?;
        self.rescan(&mut state).await?;

        let enabled: Vec<String> = state
            .descriptors
            .values()
            .filter(|d| d.enabled())
            .map(|d| d.id().to_string())
            .collect();

        let mut report = StartupReport {
            discovered: state.descriptors.len(),
            ..Default::default()
        };
        for id in enabled {
            match self.activate_locked(&mut state, &id).await {
                Ok(()) => report.activated.push(id),
                Err(e) => report.failed.push((id, e.code().to_string())),
            }
        }

        info!(
            "Extension startup: {} discovered, {} active, {} failed",
            report.discovered,
            report.activated.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Deactivate everything that is loaded. Returns how many were unloaded.
    pub async fn shutdown_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut ids: Vec<String> = state.loaded.keys().cloned().collect();
        ids.sort();

        for id in &ids {
            if let Err(e) = self.deactivate_locked(&mut state, id).await {
                warn!("Failed to deactivate {} during shutdown: {}", id, e);
            }
        }
        ids.len()
    }

    /// `(known, loaded)` extension counts
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.descriptors.len(), state.loaded.len())
    }

    pub async fn is_loaded(&self, id: &str) -> bool {
        let state = self.state.lock().await;
        state.loaded.contains_key(id)
    }

    async fn rescan(&self, state: &mut ManagerState) -> ExtensionResult<()> {
        let discovery = self.registry.discover().await?;
        state.descriptors = discovery.extensions;

        let mut orphans: Vec<String> = state
            .loaded
            .keys()
            .filter(|id| !state.descriptors.contains_key(*id))
            .cloned()
            .collect();
        orphans.sort();

        for id in orphans {
            warn!("Extension {} disappeared from disk, deactivating", id);
            if let Some(record) = state.loaded.remove(&id) {
                if let Err(e) = self.loader.unload(&id, record).await {
                    warn!("Shutdown hook of {} failed: {}", id, e);
                }
            }
            self.activity.warning(
                "unload_extension",
                format!("Unloaded extension {} (removed from disk)", id),
            );
        }
        Ok(())
    }

    async fn activate_locked(&self, state: &mut ManagerState, id: &str) -> ExtensionResult<()> {
        let descriptor = match state.descriptors.get(id) {
            Some(descriptor) => descriptor.clone(),
            None => {
                error!("Cannot activate unknown extension {}", id);
                self.activity
                    .error("load_extension", format!("Unknown extension {}", id));
                return Err(ExtensionError::NotFound(id.to_string()));
            }
        };
        if !descriptor.enabled() {
            error!("Cannot activate disabled extension {}", id);
            self.activity
                .error("load_extension", format!("Extension {} is disabled", id));
            return Err(ExtensionError::Disabled(id.to_string()));
        }
        if state.loaded.contains_key(id) {
            return Ok(());
        }

        match self.loader.load(&descriptor).await {
            Ok(record) => {
                info!(
                    "Loaded extension {} ({} routes under {})",
                    id,
                    record.route_count(),
                    record.prefix()
                );
                self.activity.success(
                    "load_extension",
                    format!("Loaded extension {}", descriptor.name()),
                );
                state.loaded.insert(id.to_string(), record);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load extension {}: {}", id, e);
                self.activity.error(
                    "load_extension",
                    format!("Failed to load extension {}: {}", id, e),
                );
                Err(e)
            }
        }
    }

    async fn deactivate_locked(&self, state: &mut ManagerState, id: &str) -> ExtensionResult<()> {
        let Some(record) = state.loaded.remove(id) else {
            return Ok(());
        };

        if let Err(e) = self.loader.unload(id, record).await {
            warn!("Shutdown hook of {} failed: {}", id, e);
        }
        info!("Unloaded extension {}", id);
        self.activity
            .info("unload_extension", format!("Unloaded extension {}", id));
        Ok(())
    }
}

fn summaries(state: &ManagerState) -> Vec<ExtensionSummary> {
    state
        .descriptors
        .values()
        .map(|d| d.summary(state.loaded.contains_key(d.id())))
        .collect()
}
