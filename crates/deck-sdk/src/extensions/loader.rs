//! Extension Loader
//!
//! Turns a descriptor into a running module: reads the code unit, resolves
//! it, runs the hooks and binds the route group.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use super::routes::{RouteGroup, RouteTable};
use super::types::*;
use super::unit::{CodeUnit, ExtensionModule, ModuleCatalog};

/// Handle to an activated extension
pub struct LoadedExtension {
    module: Arc<dyn ExtensionModule>,
    prefix: String,
    route_count: usize,
}

impl LoadedExtension {
    /// Route prefix the extension's group is bound under
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn route_count(&self) -> usize {
        self.route_count
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("prefix", &self.prefix)
            .field("route_count", &self.route_count)
            .finish()
    }
}

/// Extension loader
pub struct ExtensionLoader {
    root: PathBuf,
    catalog: ModuleCatalog,
    routes: Arc<RouteTable>,
}

impl ExtensionLoader {
    pub fn new(root: impl Into<PathBuf>, catalog: ModuleCatalog, routes: Arc<RouteTable>) -> Self {
        Self {
            root: root.into(),
            catalog,
            routes,
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Activate an extension
    ///
    /// Nothing is bound unless every step succeeds. A module whose route
    /// registration panics is shut down again before the error is returned.
    pub async fn load(&self, descriptor: &ExtensionDescriptor) -> ExtensionResult<LoadedExtension> {
        let id = descriptor.id();
        let dir = self.root.join(&descriptor.directory);

        let unit = CodeUnit::load(&dir).await?;
        let module = self.catalog.resolve(id, &dir, unit)?;

        module
            .init()
            .await
            .map_err(|e| ExtensionError::hook_failed("init", format!("{:#}", e)))?;

        let mut group = RouteGroup::new(id);
        let registered =
            std::panic::catch_unwind(AssertUnwindSafe(|| module.register_routes(&mut group)));
        if let Err(panic) = registered {
            if let Err(e) = module.shutdown().await {
                warn!("Shutdown of {} after failed route registration failed: {:#}", id, e);
            }
            return Err(ExtensionError::hook_failed(
                "register_routes",
                panic_message(panic.as_ref()),
            ));
        }

        let prefix = group.prefix().to_string();
        let route_count = group.route_count();
        self.routes.bind(group).await;
        debug!("Bound {} routes for {} under {}", route_count, id, prefix);

        Ok(LoadedExtension {
            module,
            prefix,
            route_count,
        })
    }

    /// Deactivate an extension
    ///
    /// The route group is unbound before the shutdown hook runs. The record is
    /// consumed even when the hook fails.
    pub async fn unload(&self, id: &str, record: LoadedExtension) -> ExtensionResult<()> {
        self.routes.unbind(id).await;
        record
            .module
            .shutdown()
            .await
            .map_err(|e| ExtensionError::hook_failed("shutdown", format!("{:#}", e)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during route registration".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        shutdowns: AtomicUsize,
    }

    struct PanickingModule(Arc<Probe>);

    #[async_trait]
    impl ExtensionModule for PanickingModule {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn register_routes(&self, _routes: &mut RouteGroup) {
            panic!("bad route table");
        }
    }

    struct FailingInit;

    #[async_trait]
    impl ExtensionModule for FailingInit {
        async fn init(&self) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }

        fn register_routes(&self, _routes: &mut RouteGroup) {}
    }

    fn descriptor(id: &str) -> ExtensionDescriptor {
        ExtensionDescriptor {
            manifest: ExtensionManifest {
                id: id.into(),
                name: id.into(),
                version: "0.1.0".into(),
                description: None,
                author: None,
                enabled: true,
                extra: Map::new(),
            },
            directory: id.into(),
        }
    }

    fn write_unit(root: &std::path::Path, id: &str, unit: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ENTRY_POINT_FILE), unit).unwrap();
    }

    fn request(uri: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_declarative_and_unload() {
        let root = tempfile::tempdir().unwrap();
        write_unit(
            root.path(),
            "greeter",
            "[init]\n\n[[routes]]\npath = \"/info\"\nresponse = { id = \"greeter\" }\n",
        );

        let routes = Arc::new(RouteTable::new());
        let loader = ExtensionLoader::new(root.path(), ModuleCatalog::new(), routes.clone());

        let record = loader.load(&descriptor("greeter")).await.unwrap();
        assert_eq!(record.prefix(), "/api/ext/greeter");
        assert_eq!(record.route_count(), 1);

        let response = routes.dispatch("greeter", request("/api/ext/greeter/info")).await;
        assert_eq!(response.status(), StatusCode::OK);

        loader.unload("greeter", record).await.unwrap();
        let response = routes.dispatch("greeter", request("/api/ext/greeter/info")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_code_unit() {
        let root = tempfile::tempdir().unwrap();
        let routes = Arc::new(RouteTable::new());
        let loader = ExtensionLoader::new(root.path(), ModuleCatalog::new(), routes.clone());

        let err = loader.load(&descriptor("ghost")).await.unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(!routes.is_bound("ghost").await);
    }

    #[tokio::test]
    async fn test_missing_hook_binds_nothing() {
        let root = tempfile::tempdir().unwrap();
        write_unit(root.path(), "partial", "[[routes]]\npath = \"/a\"\n");

        let routes = Arc::new(RouteTable::new());
        let loader = ExtensionLoader::new(root.path(), ModuleCatalog::new(), routes.clone());

        let err = loader.load(&descriptor("partial")).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_HOOK");
        assert!(routes.bound().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_init() {
        let root = tempfile::tempdir().unwrap();
        write_unit(root.path(), "db", "module = \"failing\"\n");

        let catalog = ModuleCatalog::new().with("failing", || Arc::new(FailingInit) as Arc<dyn ExtensionModule>);
        let routes = Arc::new(RouteTable::new());
        let loader = ExtensionLoader::new(root.path(), catalog, routes.clone());

        let err = loader.load(&descriptor("db")).await.unwrap_err();
        assert!(matches!(err, ExtensionError::HookFailed { hook: "init", .. }));
        assert!(err.to_string().contains("database unavailable"));
        assert!(!routes.is_bound("db").await);
    }

    #[tokio::test]
    async fn test_panicking_registration_is_shut_down() {
        let root = tempfile::tempdir().unwrap();
        write_unit(root.path(), "wobbly", "module = \"panics\"\n");

        let probe = Arc::new(Probe::default());
        let factory_probe = probe.clone();
        let catalog = ModuleCatalog::new().with("panics", move || {
            Arc::new(PanickingModule(factory_probe.clone())) as Arc<dyn ExtensionModule>
        });
        let routes = Arc::new(RouteTable::new());
        let loader = ExtensionLoader::new(root.path(), catalog, routes.clone());

        let err = loader.load(&descriptor("wobbly")).await.unwrap_err();
        assert!(matches!(err, ExtensionError::HookFailed { hook: "register_routes", .. }));
        assert!(err.to_string().contains("bad route table"));
        assert_eq!(probe.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!routes.is_bound("wobbly").await);
    }

    #[test]
    fn test_panic_message() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(json!(1));
        assert_eq!(panic_message(other.as_ref()), "panic during route registration");
    }
}
