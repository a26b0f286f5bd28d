//! New extension scaffolding

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::path::Path;
use tokio::fs;
use tracing::warn;

use super::types::*;
use super::unit::{CodeUnit, HookSpec, RouteMethod, RouteSpec};

/// Version written into freshly created manifests
pub const SCAFFOLD_VERSION: &str = "0.1.0";

/// Request to create a new extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExtension {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl NewExtension {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Trim every field and drop blank optionals
    pub fn normalized(self) -> Self {
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            id: self.id.trim().to_string(),
            name: self.name.trim().to_string(),
            description: optional(self.description),
            author: optional(self.author),
        }
    }

    pub fn validate(&self) -> ExtensionResult<()> {
        if self.id.trim().is_empty() {
            return Err(ExtensionError::validation("Extension ID is required"));
        }
        if self.name.trim().is_empty() {
            return Err(ExtensionError::validation("Extension name is required"));
        }
        validate_extension_id(self.id.trim())
    }
}

/// Scaffolded ids may only contain ASCII letters, digits and underscores
///
/// Discovery skips directories with a leading underscore, so those ids are refused.
pub fn validate_extension_id(id: &str) -> ExtensionResult<()> {
    if id.is_empty() {
        return Err(ExtensionError::validation("Extension ID is required"));
    }
    if id.starts_with('_') {
        return Err(ExtensionError::validation(
            "Extension ID may not start with an underscore",
        ));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ExtensionError::validation(
            "Extension ID may only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

/// Starter code unit for a new extension
pub fn scaffold_unit(req: &NewExtension) -> CodeUnit {
    let mut info = json!({
        "id": req.id,
        "name": req.name,
        "version": SCAFFOLD_VERSION,
    });
    if let Some(description) = &req.description {
        info["description"] = json!(description);
    }
    if let Some(author) = &req.author {
        info["author"] = json!(author);
    }

    CodeUnit {
        module: None,
        library: None,
        init: Some(HookSpec::message(format!("{} initialized", req.name))),
        shutdown: Some(HookSpec::message(format!("{} unloaded", req.name))),
        routes: Some(vec![
            RouteSpec {
                method: RouteMethod::Get,
                path: "/info".into(),
                response: info,
            },
            RouteSpec {
                method: RouteMethod::Get,
                path: "/example".into(),
                response: json!({ "message": format!("Hello from {}", req.name) }),
            },
        ]),
    }
}

/// Write a new extension directory under `root`
///
/// The directory is named after the id. A partially written directory is
/// removed again on failure.
pub async fn write_scaffold(root: &Path, req: &NewExtension) -> ExtensionResult<ExtensionManifest> {
    req.validate()?;

    let dir = root.join(&req.id);
    if fs::try_exists(&dir).await.unwrap_or(false) {
        return Err(ExtensionError::AlreadyExists(req.id.clone()));
    }

    let manifest = ExtensionManifest {
        id: req.id.clone(),
        name: req.name.clone(),
        version: SCAFFOLD_VERSION.to_string(),
        description: req.description.clone(),
        author: req.author.clone(),
        enabled: false,
        extra: Map::new(),
    };

    fs::create_dir_all(&dir).await?;
    if let Err(e) = write_files(&dir, req, &manifest).await {
        if let Err(cleanup) = fs::remove_dir_all(&dir).await {
            warn!("Failed to clean up {:?}: {}", dir, cleanup);
        }
        return Err(e);
    }

    Ok(manifest)
}

async fn write_files(dir: &Path, req: &NewExtension, manifest: &ExtensionManifest) -> ExtensionResult<()> {
    manifest.save(&dir.join(MANIFEST_FILE)).await?;

    let unit = scaffold_unit(req).to_toml()?;
    let content = format!(
        "# {} extension\n#\n# Hooks and routes are served under /api/ext/{}\n\n{}",
        req.name, req.id, unit
    );
    fs::write(dir.join(ENTRY_POINT_FILE), content).await?;
    Ok(())
}
