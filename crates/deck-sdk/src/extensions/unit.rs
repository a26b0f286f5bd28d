//! Extension code units.
//!
//! Every extension directory carries an entry point (`extension.toml`). It
//! either names a native module compiled into the host, or describes the
//! extension's hooks and routes declaratively:
//!
//! ```toml
//! module = "system_monitor"
//! ```
//!
//! ```toml
//! library = "libgreeter.so"
//! ```
//!
//! ```toml
//! [init]
//! message = "Greeter initialized"
//!
//! [shutdown]
//! message = "Greeter unloaded"
//!
//! [[routes]]
//! method = "GET"
//! path = "/info"
//! [routes.response]
//! id = "greeter"
//! ```
//!
//! All three forms resolve to an [`ExtensionModule`], the three-hook plugin
//! interface the loader drives. Library paths are relative to the extension
//! directory.

use async_trait::async_trait;
use axum::routing::{get, post, MethodRouter};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use super::native::LibraryCache;
use super::routes::RouteGroup;
use super::types::{ExtensionError, ExtensionResult, ENTRY_POINT_FILE};

/// Plugin interface implemented by every extension
#[async_trait]
pub trait ExtensionModule: Send + Sync {
    /// Called once when the extension is activated, before routes are registered
    async fn init(&self) -> anyhow::Result<()>;

    /// Called when the extension is deactivated
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Attach handlers to the extension's (initially empty) route group
    fn register_routes(&self, routes: &mut RouteGroup);
}

/// Message hook of a declarative unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HookSpec {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    #[default]
    Get,
    Post,
}

/// A static JSON route of a declarative unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    #[serde(default)]
    pub method: RouteMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub response: Value,
}

/// Parsed `extension.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Native module name in the host's module catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Dynamic library exporting a module constructor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<HookSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<HookSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteSpec>>,
}

impl CodeUnit {
    /// Read the entry point of an extension directory
    pub async fn load(dir: &Path) -> ExtensionResult<Self> {
        let path = dir.join(ENTRY_POINT_FILE);
        let content = fs::read_to_string(&path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ExtensionResult<Self> {
        toml::from_str(content).map_err(|e| ExtensionError::InvalidCodeUnit(e.to_string()))
    }

    pub fn to_toml(&self) -> ExtensionResult<String> {
        toml::to_string_pretty(self).map_err(|e| ExtensionError::InvalidCodeUnit(e.to_string()))
    }
}

/// Extension module described entirely by its code unit
#[derive(Debug, Clone)]
pub struct DeclarativeModule {
    id: String,
    init: HookSpec,
    shutdown: Option<HookSpec>,
    routes: Vec<RouteSpec>,
}

impl DeclarativeModule {
    /// Build from a unit; fails if the init or route hook is missing or a
    /// route is malformed.
    pub fn from_unit(id: &str, unit: CodeUnit) -> ExtensionResult<Self> {
        let init = unit.init.ok_or_else(|| ExtensionError::MissingHook {
            id: id.to_string(),
            hook: "init",
        })?;
        let routes = unit.routes.ok_or_else(|| ExtensionError::MissingHook {
            id: id.to_string(),
            hook: "register_routes",
        })?;

        let mut seen = HashSet::new();
        for route in &routes {
            if !route.path.starts_with('/') {
                return Err(ExtensionError::InvalidCodeUnit(format!(
                    "route path must start with '/': {}",
                    route.path
                )));
            }
            if !seen.insert((route.method, route.path.as_str())) {
                return Err(ExtensionError::InvalidCodeUnit(format!(
                    "duplicate route {:?} {}",
                    route.method, route.path
                )));
            }
        }

        Ok(Self {
            id: id.to_string(),
            init,
            shutdown: unit.shutdown,
            routes,
        })
    }
}

#[async_trait]
impl ExtensionModule for DeclarativeModule {
    async fn init(&self) -> anyhow::Result<()> {
        match &self.init.message {
            Some(message) => info!(extension = %self.id, "{}", message),
            None => info!(extension = %self.id, "Extension initialized"),
        }
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        if let Some(HookSpec {
            message: Some(message),
        }) = &self.shutdown
        {
            info!(extension = %self.id, "{}", message);
        }
        Ok(())
    }

    fn register_routes(&self, routes: &mut RouteGroup) {
        for spec in &self.routes {
            let body = spec.response.clone();
            let handler = move || {
                let body = body.clone();
                async move { Json(body) }
            };
            let method_router: MethodRouter = match spec.method {
                RouteMethod::Get => get(handler),
                RouteMethod::Post => post(handler),
            };
            routes.route(&spec.path, method_router);
        }
    }
}

/// Factory producing a fresh module instance per activation
pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn ExtensionModule> + Send + Sync>;

/// Native extension modules compiled into the host, by name, plus the
/// dynamic libraries opened on behalf of extensions
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
    libraries: Arc<LibraryCache>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native module under `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn ExtensionModule> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ExtensionModule> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn libraries(&self) -> &LibraryCache {
        &self.libraries
    }

    /// Turn the code unit of the extension in `dir` into a module instance
    pub fn resolve(
        &self,
        id: &str,
        dir: &Path,
        mut unit: CodeUnit,
    ) -> ExtensionResult<Arc<dyn ExtensionModule>> {
        match (unit.module.take(), unit.library.take()) {
            (Some(_), Some(_)) => Err(ExtensionError::InvalidCodeUnit(
                "module and library are mutually exclusive".to_string(),
            )),
            (Some(name), None) => {
                let factory = self
                    .factories
                    .get(&name)
                    .ok_or(ExtensionError::UnknownModule(name))?;
                Ok(factory())
            }
            (None, Some(library)) => self.libraries.load_module(&dir.join(library)),
            (None, None) => Ok(Arc::new(DeclarativeModule::from_unit(id, unit)?)),
        }
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.names())
            .field("libraries", &self.libraries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GREETER: &str = r#"
[init]
message = "Greeter initialized"

[shutdown]
message = "Greeter unloaded"

[[routes]]
path = "/info"
[routes.response]
id = "greeter"
version = "0.1.0"

[[routes]]
method = "POST"
path = "/info"
response = { accepted = true }
"#;

    struct Noop;

    #[async_trait]
    impl ExtensionModule for Noop {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn register_routes(&self, _routes: &mut RouteGroup) {}
    }

    #[test]
    fn test_parse_declarative_unit() {
        let unit = CodeUnit::parse(GREETER).unwrap();
        assert_eq!(unit.module, None);
        assert_eq!(unit.init, Some(HookSpec::message("Greeter initialized")));

        let routes = unit.routes.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, RouteMethod::Get);
        assert_eq!(routes[0].response, json!({"id": "greeter", "version": "0.1.0"}));
        assert_eq!(routes[1].method, RouteMethod::Post);
    }

    #[test]
    fn test_parse_native_unit() {
        let unit = CodeUnit::parse("module = \"system_monitor\"\n").unwrap();
        assert_eq!(unit.module.as_deref(), Some("system_monitor"));
        assert!(unit.init.is_none());
    }

    #[test]
    fn test_parse_invalid_unit() {
        let err = CodeUnit::parse("module = [").unwrap_err();
        assert_eq!(err.code(), "INVALID_CODE_UNIT");
    }

    #[test]
    fn test_unit_toml_round_trip_preserves_routes() {
        let unit = CodeUnit::parse(GREETER).unwrap();
        let text = unit.to_toml().unwrap();
        assert_eq!(CodeUnit::parse(&text).unwrap(), unit);
    }

    #[test]
    fn test_declarative_requires_hooks() {
        let no_init = CodeUnit {
            routes: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            DeclarativeModule::from_unit("x", no_init),
            Err(ExtensionError::MissingHook { hook: "init", .. })
        ));

        let no_routes = CodeUnit {
            init: Some(HookSpec::default()),
            ..Default::default()
        };
        assert!(matches!(
            DeclarativeModule::from_unit("x", no_routes),
            Err(ExtensionError::MissingHook {
                hook: "register_routes",
                ..
            })
        ));

        let empty_routes = CodeUnit {
            init: Some(HookSpec::default()),
            routes: Some(vec![]),
            ..Default::default()
        };
        assert!(DeclarativeModule::from_unit("x", empty_routes).is_ok());
    }

    #[test]
    fn test_declarative_rejects_bad_routes() {
        let route = |path: &str| RouteSpec {
            method: RouteMethod::Get,
            path: path.into(),
            response: Value::Null,
        };

        let relative = CodeUnit {
            init: Some(HookSpec::default()),
            routes: Some(vec![route("info")]),
            ..Default::default()
        };
        assert!(DeclarativeModule::from_unit("x", relative).is_err());

        let duplicate = CodeUnit {
            init: Some(HookSpec::default()),
            routes: Some(vec![route("/a"), route("/a")]),
            ..Default::default()
        };
        assert!(DeclarativeModule::from_unit("x", duplicate).is_err());
    }

    #[test]
    fn test_declarative_registers_routes() {
        let unit = CodeUnit::parse(GREETER).unwrap();
        let module = DeclarativeModule::from_unit("greeter", unit).unwrap();

        let mut group = RouteGroup::new("greeter");
        module.register_routes(&mut group);
        assert_eq!(group.route_count(), 2);
    }

    #[test]
    fn test_catalog_resolution() {
        let catalog = ModuleCatalog::new().with("noop", || Arc::new(Noop) as Arc<dyn ExtensionModule>);
        assert!(catalog.contains("noop"));
        assert_eq!(catalog.names(), vec!["noop"]);

        let native = CodeUnit {
            module: Some("noop".into()),
            ..Default::default()
        };
        let dir = Path::new("/nonexistent");
        assert!(catalog.resolve("x", dir, native).is_ok());

        let unknown = CodeUnit {
            module: Some("missing".into()),
            ..Default::default()
        };
        assert!(matches!(
            catalog.resolve("x", dir, unknown),
            Err(ExtensionError::UnknownModule(name)) if name == "missing"
        ));

        let declarative = CodeUnit::parse(GREETER).unwrap();
        assert!(catalog.resolve("greeter", dir, declarative).is_ok());
    }

    #[test]
    fn test_parse_library_unit() {
        let unit = CodeUnit::parse("library = \"lib/libgreeter.so\"\n").unwrap();
        assert_eq!(unit.library, Some(PathBuf::from("lib/libgreeter.so")));
        assert!(unit.module.is_none());
    }

    #[test]
    fn test_library_resolves_relative_to_extension_dir() {
        let dir = tempfile::tempdir().unwrap();
        let unit = CodeUnit {
            library: Some("libgreeter.so".into()),
            ..Default::default()
        };

        let err = ModuleCatalog::new()
            .resolve("greeter", dir.path(), unit)
            .err()
            .unwrap();
        match err {
            ExtensionError::LibraryLoad { path, .. } => {
                assert_eq!(PathBuf::from(path), dir.path().join("libgreeter.so"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_module_and_library_conflict() {
        let catalog = ModuleCatalog::new().with("noop", || Arc::new(Noop) as Arc<dyn ExtensionModule>);
        let unit = CodeUnit {
            module: Some("noop".into()),
            library: Some("libnoop.so".into()),
            ..Default::default()
        };
        let err = catalog.resolve("x", Path::new("."), unit).err().unwrap();
        assert_eq!(err.code(), "INVALID_CODE_UNIT");
    }
}
