//! Server configuration.
//!
//! Precedence: `DECK_*` environment variables, then `config.toml` in the data
//! directory, then built-in defaults.

use anyhow::Context;
use deck_core::CommandPolicy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Diagnostic log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown log format: {}", other),
        }
    }
}

/// `config.toml` contents; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind: Option<String>,
    extensions_dir: Option<PathBuf>,
    activity_log: Option<PathBuf>,
    ollama_url: Option<String>,
    command_timeout_secs: Option<u64>,
    extra_allowed_commands: Vec<String>,
    extra_denied_commands: Vec<String>,
    log_format: Option<LogFormat>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory (`$DECK_HOME` or `~/.deck`)
    pub data_dir: PathBuf,
    /// Path to configuration file
    pub config_path: PathBuf,
    /// HTTP listen address
    pub bind: SocketAddr,
    /// Extension root scanned for manifests
    pub extensions_dir: PathBuf,
    /// Activity log file (JSON Lines)
    pub activity_log: PathBuf,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Hard limit for terminal commands
    pub command_timeout: Duration,
    pub extra_allowed_commands: Vec<String>,
    pub extra_denied_commands: Vec<String>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the environment, the config file and defaults
    ///
    /// Standard directory structure:
    /// ```text
    /// ~/.deck/
    /// ├── config.toml           # Optional configuration
    /// ├── activity.jsonl        # Activity log
    /// └── extensions/           # Extension root
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        let data_dir = match std::env::var_os("DECK_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".deck"),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        Self::load_from(&data_dir, |key| std::env::var(key).ok())
    }

    /// Load using `data_dir` and an explicit environment lookup
    pub fn load_from<F>(data_dir: &Path, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = data_dir.join("config.toml");
        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {:?}", config_path))?;
            toml::from_str::<FileConfig>(&content)
                .with_context(|| format!("Invalid configuration in {:?}", config_path))?
        } else {
            FileConfig::default()
        };

        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = env("DECK_BIND")
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", bind))?;

        let extensions_dir = env("DECK_EXTENSIONS_DIR")
            .map(PathBuf::from)
            .or(file.extensions_dir)
            .unwrap_or_else(|| data_dir.join("extensions"));

        let activity_log = env("DECK_ACTIVITY_LOG")
            .map(PathBuf::from)
            .or(file.activity_log)
            .unwrap_or_else(|| data_dir.join("activity.jsonl"));

        let ollama_url = env("DECK_OLLAMA_URL")
            .or_else(|| env("OLLAMA_API_URL"))
            .or(file.ollama_url)
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let ollama_url = ollama_url.trim_end_matches('/').to_string();

        let command_timeout_secs = match env("DECK_COMMAND_TIMEOUT_SECS") {
            Some(secs) => secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid DECK_COMMAND_TIMEOUT_SECS: {}", secs))?,
            None => file
                .command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        };
        if command_timeout_secs == 0 {
            anyhow::bail!("command_timeout_secs must be greater than zero");
        }

        let extra_allowed_commands = env("DECK_ALLOWED_COMMANDS")
            .map(|v| split_list(&v))
            .unwrap_or(file.extra_allowed_commands);
        let extra_denied_commands = env("DECK_DENIED_COMMANDS")
            .map(|v| split_list(&v))
            .unwrap_or(file.extra_denied_commands);

        let log_format = match env("DECK_LOG_FORMAT") {
            Some(format) => format.parse()?,
            None => file.log_format.unwrap_or_default(),
        };

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config_path,
            bind,
            extensions_dir,
            activity_log,
            ollama_url,
            command_timeout: Duration::from_secs(command_timeout_secs),
            extra_allowed_commands,
            extra_denied_commands,
            log_format,
        })
    }

    /// Default policy extended with the configured extra commands
    pub fn command_policy(&self) -> CommandPolicy {
        CommandPolicy::default()
            .allow(self.extra_allowed_commands.iter().map(String::as_str))
            .deny(self.extra_denied_commands.iter().map(String::as_str))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
