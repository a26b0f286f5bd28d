//! Application state.

use deck_core::{ActivityLog, CommandRunner};
use deck_sdk::{ExtensionManager, ModuleCatalog};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::services::OllamaService;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Extension lifecycle owner
    pub extensions: Arc<ExtensionManager>,
    /// Policy-gated terminal command runner
    pub runner: Arc<CommandRunner>,
    /// Operator activity log
    pub activity: Arc<ActivityLog>,
    /// Inference server client
    pub ollama: Arc<OllamaService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, activity: ActivityLog, catalog: ModuleCatalog) -> Arc<Self> {
        let activity = Arc::new(activity);
        let runner = CommandRunner::new(config.command_policy()).with_timeout(config.command_timeout);
        Arc::new(Self {
            extensions: Arc::new(ExtensionManager::new(
                config.extensions_dir.clone(),
                catalog,
                Arc::clone(&activity),
            )),
            runner: Arc::new(runner),
            ollama: Arc::new(OllamaService::new(config.ollama_url.clone())),
            activity,
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_state;
    use std::time::Duration;

    #[test]
    fn test_state_uses_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert_eq!(state.extensions.root(), dir.path().join("extensions"));
        assert_eq!(state.runner.timeout(), Duration::from_secs(10));
        assert!(state.extensions.catalog().contains("system_monitor"));
        assert!(state.activity.is_empty());
    }
}
