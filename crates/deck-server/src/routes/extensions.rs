//! Extension management routes.
//!
//! - GET /extensions/list - Rescan and list all extensions
//! - POST /extensions/toggle - Enable or disable an extension
//! - POST /extensions/create - Scaffold a new extension

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use deck_sdk::{ExtensionSummary, NewExtension, ToggleOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::state::AppState;

/// Create extensions router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/extensions/list", get(list_extensions))
        .route("/extensions/toggle", post(toggle_extension))
        .route("/extensions/create", post(create_extension))
}

#[derive(Debug, Serialize)]
pub struct ExtensionListResponse {
    pub extensions: Vec<ExtensionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub id: String,
    pub name: String,
    pub message: String,
}

async fn list_extensions(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ExtensionListResponse>> {
    let extensions = state.extensions.list().await.inspect_err(|e| {
        state
            .activity
            .error("list_extensions", format!("Failed to list extensions: {}", e));
    })?;

    debug!("list_extensions: returning {} extensions", extensions.len());
    Ok(Json(ExtensionListResponse { extensions }))
}

async fn toggle_extension(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Json<ToggleOutcome>> {
    let outcome = state
        .extensions
        .toggle(request.id.trim(), request.enabled)
        .await
        .inspect_err(|e| {
            warn!("Failed to toggle extension {}: {}", request.id, e);
            if !e.is_not_found() {
                state.activity.error(
                    "toggle_extension",
                    format!("Failed to toggle extension {}: {}", request.id, e),
                );
            }
        })?;

    Ok(Json(outcome))
}

async fn create_extension(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewExtension>,
) -> ApiResult<Json<CreateResponse>> {
    let summary = state.extensions.create(request).await?;

    Ok(Json(CreateResponse {
        message: format!("Extension {} created", summary.name),
        id: summary.id,
        name: summary.name,
    }))
}
