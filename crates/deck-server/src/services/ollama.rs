//! OllamaService - client for the local inference server
//!
//! Thin JSON pass-through to the Ollama HTTP API. The base URL can be changed
//! at runtime; every call reads the current value.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Timeout for the reachability probe
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect to Ollama API: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Ollama API returned status {status}")]
    Upstream { status: u16 },
}

/// Result of the reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServerStatus {
    Online {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Error {
        message: String,
    },
    Offline {
        message: String,
    },
}

/// OllamaService proxies JSON requests to the inference server
pub struct OllamaService {
    http: reqwest::Client,
    base_url: RwLock<String>,
}

impl OllamaService {
    pub fn new(base_url: impl Into<String>) -> Self {
        // The inference server is local; system proxy settings do not apply
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: RwLock::new(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    pub async fn base_url(&self) -> String {
        self.base_url.read().await.clone()
    }

    /// Point the service at another server
    pub async fn set_base_url(&self, url: &str) -> Result<String, OllamaError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(OllamaError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        let url = url.trim_end_matches('/').to_string();
        *self.base_url.write().await = url.clone();
        Ok(url)
    }

    /// Probe `/api/version`
    pub async fn status(&self) -> ServerStatus {
        let url = self.base_url().await;
        let response = self
            .http
            .get(format!("{}/api/version", url))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let version = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("version").and_then(Value::as_str).map(String::from));
                ServerStatus::Online { url, version }
            }
            Ok(response) => ServerStatus::Error {
                message: format!("Server returned status {}", response.status().as_u16()),
            },
            Err(e) => ServerStatus::Offline {
                message: format!("Failed to connect to Ollama API: {}", e),
            },
        }
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, OllamaError> {
        let url = format!("{}{}", self.base_url().await, path);
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OllamaError> {
        let url = format!("{}{}", self.base_url().await, path);
        debug!("POST {}", url);
        let response = self.http.post(url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, OllamaError> {
        let status = response.status();
        if !status.is_success() {
            return Err(OllamaError::Upstream {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
