//! Extension Registry
//!
//! Scans the extension root one level deep and builds the descriptor catalog.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::types::*;

/// A subdirectory that was not turned into a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub directory: String,
    pub reason: String,
}

/// Outcome of one discovery scan
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Valid extensions keyed by manifest id
    pub extensions: BTreeMap<String, ExtensionDescriptor>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Filesystem view of the extension root
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    root: PathBuf,
}

impl ExtensionRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an extension given its subdirectory name
    pub fn extension_dir(&self, directory: &str) -> PathBuf {
        self.root.join(directory)
    }

    /// Create the extension root if it does not exist
    pub async fn ensure_root(&self) -> ExtensionResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Scan the extension root
    ///
    /// Candidates are visited in directory-name order. Problems with a single
    /// candidate are logged and recorded in [`Discovery::skipped`]; only a
    /// failure to read the root itself is an error. A missing root yields an
    /// empty catalog.
    pub async fn discover(&self) -> ExtensionResult<Discovery> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Extension root {:?} does not exist", self.root);
                return Ok(Discovery::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => debug!("Skipping non UTF-8 entry {:?}", name),
            }
        }
        names.sort();

        let mut discovery = Discovery::default();
        for name in names {
            if name.starts_with('_') {
                continue;
            }

            // Follows symlinks
            let is_dir = fs::metadata(self.root.join(&name))
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let descriptor = match self.inspect(&name).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Skipping extension directory {}: {}", name, e);
                    discovery.skipped.push(SkippedCandidate {
                        directory: name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(existing) = discovery.extensions.get(descriptor.id()) {
                let reason = format!(
                    "Duplicate extension id {} (already provided by {})",
                    descriptor.id(),
                    existing.directory
                );
                warn!("Skipping extension directory {}: {}", name, reason);
                discovery.skipped.push(SkippedCandidate {
                    directory: name,
                    reason,
                });
                continue;
            }

            debug!("Discovered extension {} in {}", descriptor.id(), name);
            discovery
                .extensions
                .insert(descriptor.id().to_string(), descriptor);
        }

        Ok(discovery)
    }

    /// Build a descriptor for one subdirectory
    pub async fn inspect(&self, directory: &str) -> ExtensionResult<ExtensionDescriptor> {
        let dir = self.extension_dir(directory);

        let manifest_path = dir.join(MANIFEST_FILE);
        if !fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Err(ExtensionError::MissingFile {
                directory: directory.to_string(),
                file: MANIFEST_FILE,
            });
        }

        let manifest = ExtensionManifest::load(&manifest_path).await?;
        manifest.validate()?;

        if !fs::try_exists(dir.join(ENTRY_POINT_FILE)).await.unwrap_or(false) {
            return Err(ExtensionError::MissingFile {
                directory: directory.to_string(),
                file: ENTRY_POINT_FILE,
            });
        }

        Ok(ExtensionDescriptor {
            manifest,
            directory: directory.to_string(),
        })
    }
}
