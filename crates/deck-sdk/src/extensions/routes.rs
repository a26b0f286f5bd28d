//! Extension route groups and the live route table.
//!
//! An axum `Router` is fixed once the server starts serving, so extension
//! routes are not merged into it. The host mounts a single catch-all under
//! [`EXTENSION_ROUTE_PREFIX`] and forwards matching requests to the group an
//! extension bound into the [`RouteTable`]. Unbinding a group makes every one
//! of its endpoints answer 404 again.

use axum::extract::Request;
use axum::http::{Extensions, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tracing::debug;

/// Path namespace shared by all extension route groups
pub const EXTENSION_ROUTE_PREFIX: &str = "/api/ext";

/// A named, prefixed collection of request handlers owned by one extension
///
/// Paths given to [`RouteGroup::route`] are relative to the group prefix
/// (`/api/ext/{id}`).
pub struct RouteGroup {
    extension_id: String,
    prefix: String,
    router: Router,
    paths: Vec<String>,
}

impl RouteGroup {
    /// Create an empty group scoped under the extension's namespace
    pub fn new(extension_id: impl Into<String>) -> Self {
        let extension_id = extension_id.into();
        let prefix = format!("{}/{}", EXTENSION_ROUTE_PREFIX, extension_id);
        Self {
            extension_id,
            prefix,
            router: Router::new(),
            paths: Vec::new(),
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Attach a handler. Same rules as [`axum::Router::route`].
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, method_router);
        self.paths.push(path.to_string());
        self
    }

    /// Relative paths registered so far
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn route_count(&self) -> usize {
        self.paths.len()
    }

    fn into_parts(self) -> (String, String, Router) {
        (self.extension_id, self.prefix, self.router)
    }
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("extension_id", &self.extension_id)
            .field("prefix", &self.prefix)
            .field("paths", &self.paths)
            .finish()
    }
}

struct BoundGroup {
    prefix: String,
    router: Router,
}

/// Live table of bound extension route groups
#[derive(Default)]
pub struct RouteTable {
    groups: RwLock<HashMap<String, BoundGroup>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a group, replacing any group previously bound for the same extension
    pub async fn bind(&self, group: RouteGroup) {
        let (extension_id, prefix, router) = group.into_parts();
        debug!("Binding routes for {} under {}", extension_id, prefix);

        let mut groups = self.groups.write().await;
        groups.insert(extension_id, BoundGroup { prefix, router });
    }

    /// Remove an extension's group. Returns whether one was bound.
    pub async fn unbind(&self, extension_id: &str) -> bool {
        let mut groups = self.groups.write().await;
        groups.remove(extension_id).is_some()
    }

    pub async fn is_bound(&self, extension_id: &str) -> bool {
        let groups = self.groups.read().await;
        groups.contains_key(extension_id)
    }

    /// IDs of all bound groups, sorted
    pub async fn bound(&self) -> Vec<String> {
        let groups = self.groups.read().await;
        let mut ids: Vec<String> = groups.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forward a request to an extension's group
    ///
    /// `request` must carry the full path (`/api/ext/{id}/...`); the group
    /// prefix is stripped before the group's router sees it. Unknown or
    /// unbound extensions get a 404.
    pub async fn dispatch(&self, extension_id: &str, request: Request) -> Response {
        let (prefix, router) = {
            let groups = self.groups.read().await;
            match groups.get(extension_id) {
                Some(group) => (group.prefix.clone(), group.router.clone()),
                None => return StatusCode::NOT_FOUND.into_response(),
            }
        };

        let path = request.uri().path();
        let relative = match path.strip_prefix(prefix.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => return StatusCode::NOT_FOUND.into_response(),
        };

        let target = match request.uri().query() {
            Some(query) => format!("{}?{}", relative, query),
            None => relative.to_string(),
        };
        let Ok(uri) = target.parse::<Uri>() else {
            return StatusCode::BAD_REQUEST.into_response();
        };

        // Path parameters captured by the host router live in the request
        // extensions and would otherwise merge into the group's own.
        let (mut parts, body) = request.into_parts();
        parts.uri = uri;
        parts.extensions = Extensions::new();

        router
            .oneshot(Request::from_parts(parts, body))
            .await
            .unwrap_or_else(|never| match never {})
    }
}
