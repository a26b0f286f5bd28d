//! Extension route dispatch.
//!
//! Every path under `/api/ext/{id}` is handed to the extension's bound route
//! group. Groups come and go at runtime, so the host router only holds this
//! catch-all.

use axum::{
    extract::{Path, Request, State},
    response::Response,
    routing::any,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ext/{id}", any(dispatch))
        .route("/api/ext/{id}/{*rest}", any(dispatch))
}

#[derive(Debug, Deserialize)]
pub struct ExtPath {
    pub id: String,
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(ExtPath { id }): Path<ExtPath>,
    request: Request,
) -> Response {
    state.extensions.routes().dispatch(&id, request).await
}

#[cfg(test)]
mod tests {
    use crate::routes::create_router;
    use crate::routes::test_support::{get, post};
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;
    use deck_sdk::NewExtension;
    use serde_json::json;

    #[tokio::test]
    async fn test_unbound_extension_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let (status, _) = get(&app, "/api/ext/nothing/info").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "/api/ext/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_follows_activation() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = create_router(state.clone());

        state
            .extensions
            .create(NewExtension::new("weather", "Weather"))
            .await
            .unwrap();
        state.extensions.activate("weather").await.unwrap_err();

        state.extensions.toggle("weather", true).await.unwrap();
        let (status, body) = get(&app, "/api/ext/weather/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "weather");

        // Declared routes are method specific
        let (status, _) = post(&app, "/api/ext/weather/info", json!({})).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        state.extensions.toggle("weather", false).await.unwrap();
        let (status, _) = get(&app, "/api/ext/weather/info").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
