//! Routes claimed tasks to their handlers.

use anyhow::Result;
use async_trait::async_trait;
use lectio_core::models::{Task, TaskType};
use lectio_worker::TaskHandlerContext;
use std::sync::Arc;

use crate::state::AppState;
use crate::task_handlers::{PipelineTaskHandler, TaskHandler};

#[async_trait]
impl TaskHandlerContext for AppState {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::ProcessVideo => PipelineTaskHandler.process(task, self).await,
        }
    }
}
