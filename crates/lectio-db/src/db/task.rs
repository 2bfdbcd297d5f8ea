use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use lectio_core::models::{Task, TaskStatus, TaskType};

/// Channel name for PostgreSQL LISTEN/NOTIFY when a new task is created.
pub const TASK_NOTIFY_CHANNEL: &str = "lectio_new_task";

const TASK_COLUMNS: &str = r#"
    id,
    task_type,
    status,
    payload,
    result,
    scheduled_at,
    started_at,
    completed_at,
    retry_count,
    max_retries,
    timeout_seconds,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new task and notify listening workers.
    #[tracing::instrument(skip(self, payload))]
    pub async fn create_task(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: i32,
        timeout_seconds: Option<i32>,
    ) -> Result<Task> {
        let scheduled_at = scheduled_at.unwrap_or_else(Utc::now);
        let status = if scheduled_at > Utc::now() {
            TaskStatus::Scheduled
        } else {
            TaskStatus::Pending
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for task creation")?;

        let sql = format!(
            r#"
            INSERT INTO tasks (task_type, status, payload, scheduled_at, max_retries, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task: Task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_type.to_string())
            .bind(status)
            .bind(payload)
            .bind(scheduled_at)
            .bind(max_retries)
            .bind(timeout_seconds)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    task_type = %task_type,
                    "Failed to insert task into database"
                );
                anyhow::anyhow!("Failed to insert task into database: {}", e)
            })?;

        // Workers still poll, so a failed NOTIFY only delays pickup.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(TASK_NOTIFY_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                task_id = %task.id,
                "Failed to send pg_notify for new task, workers will discover task via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit transaction for task creation")?;

        tracing::info!(task_id = %task.id, task_type = %task_type, "Task created");

        Ok(task)
    }

    /// Atomically claim the oldest due task and mark it running.
    ///
    /// `FOR UPDATE SKIP LOCKED` lets several workers claim concurrently without
    /// handing out the same task twice.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_task(&self) -> Result<Option<Task>> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'running',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM tasks
                WHERE status IN ('pending', 'scheduled')
                    AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next task")?;

        if let Some(ref task) = task {
            tracing::debug!(task_id = %task.id, task_type = %task.task_type, "Task claimed");
        }

        Ok(task)
    }

    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'completed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(result)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as completed")?;

        tracing::info!(task_id = %task_id, task_type = %task.task_type, "Task completed");

        Ok(task)
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(error)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as failed")?;

        tracing::error!(
            task_id = %task_id,
            task_type = %task.task_type,
            retry_count = task.retry_count,
            "Task failed"
        );

        Ok(task)
    }

    /// Increment the retry count and schedule the task `backoff_seconds` from now.
    #[tracing::instrument(skip(self))]
    pub async fn increment_retry(&self, task_id: Uuid, backoff_seconds: u64) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'scheduled',
                retry_count = retry_count + 1,
                scheduled_at = NOW() + ($2 * interval '1 second'),
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(backoff_seconds as f64)
            .fetch_one(&self.pool)
            .await
            .context("Failed to increment retry count")?;

        tracing::info!(
            task_id = %task_id,
            retry_count = task.retry_count,
            max_retries = task.max_retries,
            "Task retry scheduled"
        );

        Ok(task)
    }

    /// Return running tasks whose timeout plus `grace_period_secs` has elapsed to
    /// `pending`, so a crashed worker does not strand them. Returns the number reaped.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                started_at = NULL,
                updated_at = NOW()
            WHERE status = 'running'
                AND started_at IS NOT NULL
                AND started_at
                    + ((COALESCE(timeout_seconds, 3600) + $1) * interval '1 second') < NOW()
            "#,
        )
        .bind(grace_period_secs as f64)
        .execute(&self.pool)
        .await
        .context("Failed to reap stale running tasks")?;

        let count = result.rows_affected();
        if count > 0 {
            tracing::warn!(count = count, "Reaped stale running tasks");
        }

        Ok(count)
    }

    /// Delete finished tasks older than `older_than_days`. Returns the number deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_old_finished_tasks(&self, older_than_days: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('completed', 'failed', 'cancelled')
                AND COALESCE(completed_at, updated_at) < NOW() - ($1 * interval '1 day')
            "#,
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await
        .context("Failed to delete old finished tasks")?;

        let count = result.rows_affected();
        if count > 0 {
            tracing::info!(
                count = count,
                older_than_days = older_than_days,
                "Deleted old finished tasks"
            );
        }

        Ok(count)
    }
}
