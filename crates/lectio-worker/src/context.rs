//! Task dispatch seam between the queue and the application.
//!
//! The queue knows nothing about videos or pipelines. The API implements
//! [`TaskHandlerContext`] for its state and routes each claimed task by type.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use lectio_core::models::Task;

/// Routes a claimed task to its handler.
///
/// The queue only holds a [`Weak`] reference, so dropping the application state stops
/// dispatch instead of keeping the state alive from a background task.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Run the task and return the JSON stored as its result.
    ///
    /// Return a [`lectio_core::TaskError`] to control retries; any other error is retried.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}

struct DetachedContext;

#[async_trait]
impl TaskHandlerContext for DetachedContext {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        Err(anyhow!(
            "No task handler attached, cannot run {} task {}",
            task.task_type,
            task.id
        ))
    }
}

/// A context that can never be upgraded. Placeholder for queues built before the
/// application state exists.
pub fn empty_context_weak() -> Weak<dyn TaskHandlerContext> {
    let detached: Arc<dyn TaskHandlerContext> = Arc::new(DetachedContext);
    Arc::downgrade(&detached)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_cannot_be_upgraded() {
        assert!(empty_context_weak().upgrade().is_none());
    }
}
