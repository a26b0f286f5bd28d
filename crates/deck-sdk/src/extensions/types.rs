//! Extension Type Definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Manifest file name inside each extension directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Code unit entry point inside each extension directory
pub const ENTRY_POINT_FILE: &str = "extension.toml";

/// Extension error types
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension not found: {0}")]
    NotFound(String),

    #[error("Extension disabled: {0}")]
    Disabled(String),

    #[error("Extension already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid extension manifest: {0}")]
    InvalidManifest(String),

    #[error("Missing {file} in extension directory {directory}")]
    MissingFile {
        directory: String,
        file: &'static str,
    },

    #[error("Invalid code unit: {0}")]
    InvalidCodeUnit(String),

    #[error("Extension {id} does not provide the {hook} hook")]
    MissingHook { id: String, hook: &'static str },

    #[error("Unknown extension module: {0}")]
    UnknownModule(String),

    #[error("Failed to load extension library {path}: {message}")]
    LibraryLoad { path: String, message: String },

    #[error("Extension hook {hook} failed: {message}")]
    HookFailed { hook: &'static str, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtensionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn hook_failed(hook: &'static str, message: impl ToString) -> Self {
        Self::HookFailed {
            hook,
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code, safe to hand to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Disabled(_) => "EXTENSION_DISABLED",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::InvalidManifest(_) => "INVALID_MANIFEST",
            Self::MissingFile { .. } => "MISSING_FILE",
            Self::InvalidCodeUnit(_) => "INVALID_CODE_UNIT",
            Self::MissingHook { .. } => "MISSING_HOOK",
            Self::UnknownModule(_) => "UNKNOWN_MODULE",
            Self::LibraryLoad { .. } => "LIBRARY_LOAD_FAILED",
            Self::HookFailed { .. } => "HOOK_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors caused by the caller's input rather than the host
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::AlreadyExists(_))
    }
}

pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Extension manifest (`manifest.json`)
///
/// Fields the host does not know about are kept in `extra` so that rewriting
/// the manifest on toggle never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Unique extension ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Version string
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Whether the extension should be active
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtensionManifest {
    /// Read and parse a manifest file
    pub async fn load(path: &Path) -> ExtensionResult<Self> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content)
            .map_err(|e| ExtensionError::InvalidManifest(format!("Invalid JSON in {:?}: {}", path, e)))
    }

    /// Write the manifest, replacing the file atomically
    pub async fn save(&self, path: &Path) -> ExtensionResult<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Check mandatory fields
    pub fn validate(&self) -> ExtensionResult<()> {
        if self.id.trim().is_empty() {
            return Err(ExtensionError::InvalidManifest("Missing extension ID".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ExtensionError::InvalidManifest("Missing extension name".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ExtensionError::InvalidManifest("Missing version".into()));
        }
        Ok(())
    }
}

/// A discovered extension: its manifest plus where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDescriptor {
    pub manifest: ExtensionManifest,
    /// Subdirectory name under the extension root
    pub directory: String,
}

impl ExtensionDescriptor {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn enabled(&self) -> bool {
        self.manifest.enabled
    }

    pub fn summary(&self, loaded: bool) -> ExtensionSummary {
        ExtensionSummary {
            id: self.manifest.id.clone(),
            name: self.manifest.name.clone(),
            version: self.manifest.version.clone(),
            description: self.manifest.description.clone().unwrap_or_default(),
            author: self.manifest.author.clone().unwrap_or_default(),
            directory: self.directory.clone(),
            enabled: self.manifest.enabled,
            loaded,
        }
    }
}

/// Descriptor as reported to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub directory: String,
    pub enabled: bool,
    pub loaded: bool,
}

/// Result of a toggle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub id: String,
    pub enabled: bool,
    pub loaded: bool,
    /// Error code when activation or deactivation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_defaults() {
        let manifest: ExtensionManifest = serde_json::from_value(json!({
            "id": "system_monitor",
            "name": "System monitor",
            "version": "0.1.0"
        }))
        .unwrap();

        assert!(!manifest.enabled);
        assert_eq!(manifest.description, None);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_manifest_missing_fields() {
        let missing = serde_json::from_value::<ExtensionManifest>(json!({
            "id": "x",
            "name": "X"
        }));
        assert!(missing.is_err());

        let blank: ExtensionManifest = serde_json::from_value(json!({
            "id": "x",
            "name": " ",
            "version": "1.0"
        }))
        .unwrap();
        assert!(matches!(blank.validate(), Err(ExtensionError::InvalidManifest(_))));
    }

    #[test]
    fn test_manifest_preserves_unknown_fields() {
        let manifest: ExtensionManifest = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "version": "1.0",
            "homepage": "https://example.com",
            "enabled": true
        }))
        .unwrap();

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["homepage"], "https://example.com");
        assert_eq!(value["enabled"], true);
    }

    #[tokio::test]
    async fn test_manifest_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let manifest = ExtensionManifest {
            id: "ab_1".into(),
            name: "X".into(),
            version: "0.1.0".into(),
            description: Some("demo".into()),
            author: None,
            enabled: false,
            extra: Map::new(),
        };
        manifest.save(&path).await.unwrap();

        let loaded = ExtensionManifest::load(&path).await.unwrap();
        assert_eq!(loaded, manifest);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_summary_fills_optional_fields() {
        let descriptor = ExtensionDescriptor {
            manifest: ExtensionManifest {
                id: "x".into(),
                name: "X".into(),
                version: "1".into(),
                description: None,
                author: Some("me".into()),
                enabled: true,
                extra: Map::new(),
            },
            directory: "x_dir".into(),
        };

        let summary = descriptor.summary(true);
        assert_eq!(summary.description, "");
        assert_eq!(summary.author, "me");
        assert_eq!(summary.directory, "x_dir");
        assert!(summary.loaded);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ExtensionError::NotFound("x".into()).code(), "NOT_FOUND");
        assert!(ExtensionError::validation("bad").is_client_error());
        assert!(!ExtensionError::UnknownModule("m".into()).is_client_error());
        let err = ExtensionError::MissingHook {
            id: "x".into(),
            hook: "init",
        };
        assert_eq!(err.code(), "MISSING_HOOK");
        assert!(err.to_string().contains("init"));
    }
}
