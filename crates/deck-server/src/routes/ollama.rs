//! Inference server proxy routes (mounted under /ollama).
//!
//! - GET /status - Reachability probe
//! - POST /set-api-url - Point the proxy at another server
//! - GET /models - Installed models
//! - POST /pull - Download a model
//! - POST /generate - Single prompt completion
//! - POST /chat - Chat completion
//! - GET /logs - Activity log (alias of /api/logs)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::routes::logs::recent_logs;
use crate::services::{OllamaError, ServerStatus};
use crate::state::AppState;

/// Create ollama router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(check_status))
        .route("/set-api-url", post(set_api_url))
        .route("/models", get(list_models))
        .route("/pull", post(pull_model))
        .route("/generate", post(generate))
        .route("/chat", post(chat))
        .route("/logs", get(recent_logs))
}

#[derive(Debug, Deserialize)]
pub struct SetUrlRequest {
    #[serde(default)]
    pub url: String,
}

impl From<OllamaError> for ApiError {
    fn from(err: OllamaError) -> Self {
        match err {
            OllamaError::InvalidUrl(message) => ApiError::bad_request(message),
            OllamaError::Upstream { status } => ApiError::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                "UPSTREAM_ERROR",
                format!("Ollama API returned status {}", status),
            ),
            e @ OllamaError::Unreachable(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_UNAVAILABLE", e.to_string())
            }
        }
    }
}

/// Log the outcome of a proxied call and convert errors
fn record(
    state: &AppState,
    action: &str,
    success: String,
    result: Result<Value, OllamaError>,
) -> ApiResult<Value> {
    match result {
        Ok(value) => {
            state.activity.success(action, success);
            Ok(value)
        }
        Err(e) => {
            state.activity.error(action, e.to_string());
            Err(e.into())
        }
    }
}

fn required_str<'a>(body: &'a Value, field: &str) -> ApiResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Field '{}' is required", field)))
}

/// Body forwarded upstream with streaming disabled
fn non_streaming(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.insert("stream".to_string(), Value::Bool(false));
    }
    body
}

async fn check_status(State(state): State<Arc<AppState>>) -> Json<ServerStatus> {
    let status = state.ollama.status().await;
    match &status {
        ServerStatus::Online { url, .. } => state
            .activity
            .success("check_status", format!("Connected to Ollama API at {}", url)),
        ServerStatus::Error { message } | ServerStatus::Offline { message } => {
            state.activity.error("check_status", message.clone())
        }
    }
    Json(status)
}

async fn set_api_url(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetUrlRequest>,
) -> ApiResult<Json<Value>> {
    if request.url.trim().is_empty() {
        return Err(ApiError::bad_request("URL not specified"));
    }
    let url = state.ollama.set_base_url(&request.url).await?;
    state
        .activity
        .success("set_api_url", format!("API URL changed to {}", url));

    Ok(Json(json!({
        "message": format!("API URL changed to {}", url),
        "url": url,
    })))
}

async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let result = state.ollama.get_json("/api/tags").await;
    record(&state, "get_models", "Fetched model list".into(), result).map(Json)
}

async fn pull_model(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let model = required_str(&body, "model")?.to_string();
    let upstream = json!({"name": model, "model": model, "stream": false});

    let result = state.ollama.post_json("/api/pull", &upstream).await;
    record(&state, "pull_model", format!("Pulled model {}", model), result)?;
    Ok(Json(json!({"message": format!("Model {} is being pulled", model)})))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let model = required_str(&body, "model")?.to_string();
    required_str(&body, "prompt")?;

    let result = state.ollama.post_json("/api/generate", &non_streaming(body)).await;
    record(&state, "generate", format!("Generated text with {}", model), result).map(Json)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let model = required_str(&body, "model")?.to_string();
    let has_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .is_some_and(|m| !m.is_empty());
    if !has_messages {
        return Err(ApiError::bad_request("Field 'messages' is required"));
    }

    let result = state.ollama.post_json("/api/chat", &non_streaming(body)).await;
    record(&state, "chat", format!("Chat with {}", model), result).map(Json)
}
