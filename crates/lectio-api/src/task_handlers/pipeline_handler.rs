use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use lectio_core::models::{ProcessVideoPayload, Task};
use lectio_core::TaskError;
use lectio_processing::{PipelineError, PipelineOutcome};

use super::TaskHandler;
use crate::state::AppState;

pub struct PipelineTaskHandler;

const DEFAULT_TASK_TIMEOUT_SECS: u64 = 3600;
const MAX_ABANDON_MARGIN: Duration = Duration::from_secs(30);

fn task_timeout(task: &Task) -> Duration {
    task.timeout_seconds
        .filter(|s| *s > 0)
        .map(|s| Duration::from_secs(s as u64))
        .unwrap_or(Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS))
}

/// The run gets the task timeout minus a margin, so the handler is still alive to
/// record the failure before the queue drops it.
fn run_deadline(timeout: Duration) -> Duration {
    timeout - (timeout / 10).min(MAX_ABANDON_MARGIN)
}

/// Store failures are retried by the queue; everything else has already been recorded on
/// the video (or cannot be fixed by retrying) and fails the task for good.
fn into_task_error(err: PipelineError) -> anyhow::Error {
    if err.is_retryable() {
        TaskError::recoverable(err).into()
    } else {
        TaskError::unrecoverable(err).into()
    }
}

/// No further attempt will run for this video, so it must not stay in `processing`.
async fn abandon(state: &AppState, video_id: uuid::Uuid, reason: &str) {
    if let Err(e) = state.pipeline.abandon_run(video_id, reason).await {
        tracing::error!(video_id = %video_id, error = %e, "Failed to mark abandoned video as failed");
    }
}

#[async_trait]
impl TaskHandler for PipelineTaskHandler {
    #[tracing::instrument(skip(self, task, state), fields(task.id = %task.id, video.id = tracing::field::Empty))]
    async fn process(&self, task: &Task, state: Arc<AppState>) -> Result<serde_json::Value> {
        let payload: ProcessVideoPayload = task
            .try_payload_as()
            .context("Failed to parse process video payload")
            .map_err(|e| anyhow::Error::from(TaskError::unrecoverable(e)))?;

        tracing::Span::current().record("video.id", payload.video_id.to_string());
        tracing::info!(video_id = %payload.video_id, "Processing lecture video");

        let timeout = task_timeout(task);
        let run = state.pipeline.run_pipeline(payload.video_id);
        let Ok(result) = tokio::time::timeout(run_deadline(timeout), run).await else {
            let reason = format!(
                "Processing did not finish within the {} second task timeout",
                timeout.as_secs()
            );
            tracing::error!(video_id = %payload.video_id, "{}", reason);
            abandon(&state, payload.video_id, &reason).await;
            return Err(TaskError::unrecoverable(anyhow::anyhow!(reason)).into());
        };

        match result {
            Ok(PipelineOutcome::Completed { topics }) => {
                tracing::info!(video_id = %payload.video_id, topics, "Lecture video processed");
                Ok(json!({
                    "status": "completed",
                    "video_id": payload.video_id,
                    "topics": topics
                }))
            }
            Ok(PipelineOutcome::Skipped { status }) => {
                tracing::info!(
                    video_id = %payload.video_id,
                    status = %status,
                    "Video already processed, skipping"
                );
                Ok(json!({
                    "status": "skipped",
                    "video_id": payload.video_id,
                    "processing_status": status.to_string()
                }))
            }
            Ok(PipelineOutcome::Superseded) => {
                tracing::warn!(
                    video_id = %payload.video_id,
                    "Video status changed during the run, results dropped"
                );
                Ok(json!({
                    "status": "superseded",
                    "video_id": payload.video_id
                }))
            }
            Err(e) => {
                tracing::error!(
                    video_id = %payload.video_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Lecture video processing failed"
                );
                if e.is_retryable() && !task.can_retry() {
                    abandon(&state, payload.video_id, &format!("Processing failed: {e}")).await;
                }
                Err(into_task_error(e))
            }
        }
    }
}
