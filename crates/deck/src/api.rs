//! API client for deck-server.
//!
//! Typed wrappers over the JSON endpoints the CLI uses:
//! - Extension list, toggle and create
//! - Terminal execution
//! - Activity log
//! - Health

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{CliError, CliResult};

/// Default server address.
pub const DEFAULT_URL: &str = "http://127.0.0.1:5000";

/// API client for deck-server.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub enabled: bool,
    pub loaded: bool,
}

#[derive(Debug, Deserialize)]
struct ExtensionList {
    extensions: Vec<Extension>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResult {
    pub id: String,
    pub enabled: bool,
    pub loaded: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
    pub name: String,
    pub message: String,
}

/// Request body for `POST /api/extensions/create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub output: String,
    pub error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: String,
    pub details: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub host: String,
    pub extensions: ExtensionCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionCounts {
    pub known: usize,
    pub loaded: usize,
}

impl ApiClient {
    /// Create a new API client for `base_url`.
    pub fn new(base_url: &str) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CliError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, request: RequestBuilder) -> CliResult<Response> {
        request.send().await.map_err(|e| CliError::Unreachable {
            url: self.base_url.clone(),
            message: e.to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Extensions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_extensions(&self) -> CliResult<Vec<Extension>> {
        let response = self.send(self.request(Method::GET, "/api/extensions/list")).await?;
        let list: ExtensionList = decode(response).await?;
        Ok(list.extensions)
    }

    pub async fn toggle_extension(&self, id: &str, enabled: bool) -> CliResult<ToggleResult> {
        let request = self
            .request(Method::POST, "/api/extensions/toggle")
            .json(&json!({"id": id, "enabled": enabled}));
        decode(self.send(request).await?).await
    }

    pub async fn create_extension(&self, body: &CreateRequest) -> CliResult<Created> {
        let request = self.request(Method::POST, "/api/extensions/create").json(body);
        decode(self.send(request).await?).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Terminal, logs, health
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a command through the server's terminal endpoint.
    ///
    /// Denials, timeouts and spawn failures come back as an output with
    /// `error: true`; only malformed requests are errors.
    pub async fn execute(&self, command: &str) -> CliResult<ExecOutput> {
        let request = self
            .request(Method::POST, "/api/terminal/execute")
            .json(&json!({"command": command}));
        let response = self.send(request).await?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ExecOutput>(&text) {
            Ok(output) => Ok(output),
            Err(_) => Err(CliError::Api {
                status,
                message: error_message(&text),
            }),
        }
    }

    pub async fn logs(&self, limit: usize) -> CliResult<Vec<LogEntry>> {
        let request = self
            .request(Method::GET, "/api/logs")
            .query(&[("limit", limit)]);
        decode(self.send(request).await?).await
    }

    pub async fn health(&self) -> CliResult<Health> {
        decode(self.send(self.request(Method::GET, "/health")).await?).await
    }
}

/// Decode a success body, or turn the server's error body into an error.
async fn decode<T: DeserializeOwned>(response: Response) -> CliResult<T> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(CliError::Api {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    Ok(serde_json::from_str(&text)?)
}

/// Message from an `{"error": ...}` body, else the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response".to_string()
            } else {
                trimmed.to_string()
            }
        })
}
