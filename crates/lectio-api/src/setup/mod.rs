//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use lectio_core::Config;
use lectio_worker::TaskQueue;
use std::sync::Arc;

/// Everything `main` needs to serve requests and shut down cleanly.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub task_queue: Arc<TaskQueue>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.json_logs())
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let (state, task_queue) = services::initialize_services(&config, pool).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok(App {
        state,
        router,
        task_queue,
    })
}
