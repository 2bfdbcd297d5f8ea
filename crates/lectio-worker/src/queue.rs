//! Task queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.
//!
//! Shutdown: [`TaskQueue::shutdown`] signals the pool to stop claiming; it does not wait
//! for in-flight tasks. A task cut off by process exit stays `running` until the stale
//! task reaper requeues it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use lectio_core::models::{Task, TaskType};
use lectio_core::TaskError;
use lectio_db::{TaskRepository, TASK_NOTIFY_CHANNEL};

use crate::context::TaskHandlerContext;

/// Maximum delay in seconds before retrying a failed task. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

const LISTENER_RECONNECT_SECS: u64 = 5;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// What to do with a task whose handler failed or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureAction {
    Retry { backoff_seconds: u64 },
    Fail { unrecoverable: bool },
}

pub(crate) fn failure_action(task: &Task, err: Option<&anyhow::Error>) -> FailureAction {
    let unrecoverable = err
        .and_then(|e| e.downcast_ref::<TaskError>())
        .map(|te| !te.is_recoverable())
        .unwrap_or(false);

    if unrecoverable {
        FailureAction::Fail {
            unrecoverable: true,
        }
    } else if task.can_retry() {
        FailureAction::Retry {
            backoff_seconds: compute_retry_backoff_seconds(task.retry_count),
        }
    } else {
        FailureAction::Fail {
            unrecoverable: false,
        }
    }
}

/// Enqueues background work. Implemented by [`TaskQueue`]; handlers depend on this
/// trait so they can be exercised without a database.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit_task(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid>;
}

#[derive(Clone, Debug)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
    /// Interval in seconds between runs of the stale task reaper. 0 disables it.
    pub stale_task_reap_interval_secs: u64,
    /// Grace period in seconds added to task timeout before reaping stale running tasks.
    pub stale_task_grace_period_secs: i64,
    /// Completed, failed and cancelled tasks older than this are purged by the reaper.
    /// 0 keeps them forever.
    pub finished_task_retention_days: i32,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            default_timeout_seconds: 3600,
            max_retries: 3,
            stale_task_reap_interval_secs: 60,
            stale_task_grace_period_secs: 300,
            finished_task_retention_days: 30,
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    repository: TaskRepository,
    config: TaskQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Create a queue and spawn its worker pool.
    ///
    /// If `pool` is `Some`, the worker also uses PostgreSQL LISTEN/NOTIFY to wake as soon
    /// as a task is created; otherwise it only polls every `poll_interval_ms`.
    pub fn new(
        repository: TaskRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let repo_clone = repository.clone();
        let config_clone = config.clone();
        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    async fn worker_pool(
        repository: TaskRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // LISTEN runs on its own connection and only nudges the main loop.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            tokio::spawn(Self::listen_for_new_tasks(pool, notify_tx));
        }

        let (reaper_shutdown_tx, reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_task_reap_interval_secs > 0 {
            tokio::spawn(Self::reaper(
                repository.clone(),
                config.clone(),
                reaper_shutdown_rx,
            ));
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = notify_rx.recv() => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    async fn listen_for_new_tasks(pool: sqlx::PgPool, tx: mpsc::Sender<()>) {
        loop {
            match sqlx::postgres::PgListener::connect_with(&pool).await {
                Ok(mut listener) => {
                    if let Err(e) = listener.listen(TASK_NOTIFY_CHANNEL).await {
                        tracing::warn!(error = %e, "LISTEN failed, will retry");
                        sleep(Duration::from_secs(LISTENER_RECONNECT_SECS)).await;
                        continue;
                    }
                    while listener.recv().await.is_ok() {
                        if tx.send(()).await.is_err() {
                            return;
                        }
                    }
                    tracing::warn!("Task listener connection lost, reconnecting");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "PgListener connect failed, will retry");
                    sleep(Duration::from_secs(LISTENER_RECONNECT_SECS)).await;
                }
            }
        }
    }

    async fn reaper(
        repository: TaskRepository,
        config: TaskQueueConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.stale_task_reap_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = repository
                        .reap_stale_running_tasks(config.stale_task_grace_period_secs)
                        .await
                    {
                        tracing::error!(error = %e, "Stale task reaper failed");
                    }

                    if config.finished_task_retention_days > 0 {
                        if let Err(e) = repository
                            .delete_old_finished_tasks(config.finished_task_retention_days)
                            .await
                        {
                            tracing::error!(error = %e, "Finished task cleanup failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    async fn claim_and_dispatch_one(
        repository: &TaskRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn TaskHandlerContext>,
    ) {
        // Nothing can run a task until the handler context is alive.
        if context.strong_count() == 0 {
            tracing::trace!("Task handler context not available, skipping claim");
            return;
        }

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        match repository.claim_next_task().await {
            Ok(Some(task)) => {
                let repo = repository.clone();
                let ctx = context.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = Self::process_task_with_retry(task, repo, ctx).await {
                        tracing::error!(error = %e, "Task processing failed");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No tasks available in queue");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim task from queue");
            }
        }
    }

    #[tracing::instrument(skip(repository, context), fields(task.id = %task.id, task.type = %task.task_type))]
    async fn process_task_with_retry(
        task: Task,
        repository: TaskRepository,
        context: Weak<dyn TaskHandlerContext>,
    ) -> Result<()> {
        let ctx = context.upgrade().ok_or_else(|| {
            anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
        })?;

        let timeout_duration = task
            .timeout_seconds
            .filter(|s| *s > 0)
            .map(|s| Duration::from_secs(s as u64))
            .unwrap_or(Duration::from_secs(3600));

        let result = tokio::time::timeout(timeout_duration, ctx.dispatch_task(&task)).await;

        let (error, error_result) = match result {
            Ok(Ok(task_result)) => {
                repository
                    .mark_completed(task.id, task_result)
                    .await
                    .context("Failed to mark task as completed")?;
                tracing::info!(task_id = %task.id, task_type = %task.task_type, "Task completed successfully");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::error!(
                    task_id = %task.id,
                    error = %e,
                    retry_count = task.retry_count,
                    max_retries = task.max_retries,
                    "Task execution failed"
                );
                let error_result = json!({
                    "error": e.to_string(),
                    "retry_count": task.retry_count,
                });
                (Some(e), error_result)
            }
            Err(_) => {
                tracing::error!(
                    task_id = %task.id,
                    timeout_seconds = ?task.timeout_seconds,
                    "Task execution timed out"
                );
                let error_result = json!({
                    "error": "Task execution timed out",
                    "timeout_seconds": task.timeout_seconds,
                    "retry_count": task.retry_count,
                });
                (None, error_result)
            }
        };

        match failure_action(&task, error.as_ref()) {
            FailureAction::Retry { backoff_seconds } => {
                tracing::info!(
                    task_id = %task.id,
                    retry_count = task.retry_count + 1,
                    backoff_seconds,
                    "Scheduling task retry"
                );
                repository
                    .increment_retry(task.id, backoff_seconds)
                    .await
                    .context("Failed to schedule task retry")?;
                Ok(())
            }
            FailureAction::Fail { unrecoverable } => {
                let mut error_result = error_result;
                error_result["unrecoverable"] = json!(unrecoverable);
                error_result["reason"] = json!(if unrecoverable {
                    "Task failed with unrecoverable error"
                } else {
                    "Task failed after maximum retries"
                });
                repository
                    .mark_failed(task.id, error_result)
                    .await
                    .context("Failed to mark task as failed")?;

                tracing::error!(task_id = %task.id, unrecoverable, "Task failed, will not retry");
                Err(error.unwrap_or_else(|| anyhow::anyhow!("Task execution timed out")))
            }
        }
    }

    /// Signals the worker pool to stop claiming new tasks and exit the main loop.
    ///
    /// Returns immediately; already-spawned task handlers keep running until they finish
    /// or hit their timeout.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl TaskSubmitter for TaskQueue {
    #[tracing::instrument(skip(self, payload))]
    async fn submit_task(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let task = self
            .repository
            .create_task(
                task_type,
                payload,
                scheduled_at,
                self.config.max_retries,
                Some(self.config.default_timeout_seconds),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    task_type = %task_type,
                    "Failed to create task in repository"
                );
                anyhow::anyhow!("Failed to create task in repository: {}", e)
            })?;

        tracing::info!(task_id = %task.id, task_type = %task_type, "Task submitted to queue");
        Ok(task.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectio_core::models::TaskStatus;

    fn running_task(retry_count: i32, max_retries: i32) -> Task {
        Task {
            id: Uuid::new_v4(),
            task_type: TaskType::ProcessVideo,
            status: TaskStatus::Running,
            payload: json!({ "video_id": Uuid::new_v4() }),
            result: None,
            scheduled_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
            retry_count,
            max_retries,
            timeout_seconds: Some(3600),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(64), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn unrecoverable_error_fails_immediately() {
        let err: anyhow::Error =
            TaskError::unrecoverable(anyhow::anyhow!("Transcription failed: 503")).into();
        assert_eq!(
            failure_action(&running_task(0, 3), Some(&err)),
            FailureAction::Fail {
                unrecoverable: true
            }
        );
    }

    #[test]
    fn recoverable_error_retries_with_backoff() {
        let err: anyhow::Error = TaskError::recoverable(anyhow::anyhow!("pool timed out")).into();
        assert_eq!(
            failure_action(&running_task(2, 3), Some(&err)),
            FailureAction::Retry { backoff_seconds: 4 }
        );
    }

    #[test]
    fn plain_error_is_treated_as_recoverable() {
        let err = anyhow::anyhow!("connection reset");
        assert_eq!(
            failure_action(&running_task(0, 3), Some(&err)),
            FailureAction::Retry { backoff_seconds: 1 }
        );
    }

    #[test]
    fn exhausted_retries_fail() {
        let err = anyhow::anyhow!("connection reset");
        assert_eq!(
            failure_action(&running_task(3, 3), Some(&err)),
            FailureAction::Fail {
                unrecoverable: false
            }
        );
    }

    #[test]
    fn timeout_retries_while_budget_remains() {
        assert_eq!(
            failure_action(&running_task(1, 3), None),
            FailureAction::Retry { backoff_seconds: 2 }
        );
        assert_eq!(
            failure_action(&running_task(3, 3), None),
            FailureAction::Fail {
                unrecoverable: false
            }
        );
    }
}
