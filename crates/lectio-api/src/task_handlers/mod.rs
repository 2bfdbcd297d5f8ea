//! Handlers for tasks claimed from the queue.

mod pipeline_handler;

pub use pipeline_handler::PipelineTaskHandler;

use anyhow::Result;
use async_trait::async_trait;
use lectio_core::models::Task;
use std::sync::Arc;

use crate::state::AppState;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn process(&self, task: &Task, state: Arc<AppState>) -> Result<serde_json::Value>;
}
