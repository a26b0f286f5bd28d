//! Activity log view.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use deck_core::ActivityEntry;
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;

pub const DEFAULT_LOG_LIMIT: usize = 50;

/// Create logs router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/logs", get(recent_logs))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// Newest entries first
pub async fn recent_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<ActivityEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(state.activity.recent(Some(limit)))
}
