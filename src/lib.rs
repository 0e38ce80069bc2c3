pub mod autosave;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod database;
pub mod docs;
pub mod editor;
pub mod error;
pub mod notify;
pub mod routes;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

use commands::{AppState, StartupError};
use config::AppConfig;

/// Install the global subscriber; `RUST_LOG` overrides the default `info` level
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}

/// Load configuration and wire the application state
pub fn run() -> Result<AppState, StartupError> {
    init_tracing();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, backend = ?config.backend, "starting inkpad");

    AppState::from_config(config)
}
