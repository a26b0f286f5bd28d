//! deck-server - Deck backend server
//!
//! REST API, extension host and terminal endpoint over TCP.

use deck_core::ActivityLog;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod builtin;
mod config;
mod error;
mod routes;
mod services;
mod state;

use config::{Config, LogFormat};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration decides the log format, so it loads first
    let config = Config::load()?;

    let filter = EnvFilter::from_default_env().add_directive("deck_server=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }

    info!("deck-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config loaded from {:?}", config.config_path);

    let activity = ActivityLog::open(&config.activity_log)?;
    let bind = config.bind;
    let state = AppState::new(config, activity, builtin::catalog());

    let installed = builtin::install_bundled(state.extensions.root()).await?;
    if !installed.is_empty() {
        info!("Installed bundled extensions: {}", installed.join(", "));
    }

    let report = state.extensions.startup().await?;
    info!(
        "Extensions: {} discovered, {} activated",
        report.discovered,
        report.activated.len()
    );
    for (id, reason) in &report.failed {
        warn!("Extension {} failed to activate: {}", id, reason);
    }

    let app = routes::create_router(state.clone());
    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    let unloaded = state.extensions.shutdown_all().await;
    info!("Unloaded {} extensions", unloaded);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
