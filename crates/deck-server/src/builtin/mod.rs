//! Extension modules compiled into the server.

pub mod system_monitor;

use deck_sdk::extensions::{ENTRY_POINT_FILE, MANIFEST_FILE};
use deck_sdk::{ExtensionModule, ModuleCatalog};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use system_monitor::SystemMonitor;

/// Extension directories shipped with the server: (id, manifest, code unit)
const BUNDLED: &[(&str, &str, &str)] = &[(
    system_monitor::MODULE_NAME,
    include_str!("../../../../extensions/system_monitor/manifest.json"),
    include_str!("../../../../extensions/system_monitor/extension.toml"),
)];

/// Catalog of every native module the server can activate
pub fn catalog() -> ModuleCatalog {
    ModuleCatalog::new().with(system_monitor::MODULE_NAME, || {
        Arc::new(SystemMonitor::new()) as Arc<dyn ExtensionModule>
    })
}

/// Write each bundled extension into `root` unless its directory already exists
///
/// Existing directories are never touched, so an operator's enabled flag and
/// edits survive restarts. Returns the ids that were written.
pub async fn install_bundled(root: &Path) -> std::io::Result<Vec<&'static str>> {
    let mut installed = Vec::new();
    for &(id, manifest, unit) in BUNDLED {
        let dir = root.join(id);
        if fs::try_exists(&dir).await? {
            continue;
        }

        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(MANIFEST_FILE), manifest).await?;
        fs::write(dir.join(ENTRY_POINT_FILE), unit).await?;
        info!("Installed bundled extension {} into {:?}", id, dir);
        installed.push(id);
    }
    Ok(installed)
}
