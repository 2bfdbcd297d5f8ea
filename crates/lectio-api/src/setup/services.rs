//! Builds repositories, external clients, orchestrators and the task queue.

use crate::state::{AppState, MediaState};
use crate::validation::VideoValidator;
use anyhow::{Context, Result};
use lectio_core::Config;
use lectio_db::{PgClassRepository, PgVideoRepository, TaskRepository, VideoStore};
use lectio_processing::{
    CarryForwardStitcher, FfmpegAudioExtractor, PipelineConfig, PipelineOrchestrator,
    QuizOrchestrator,
};
use lectio_services::{ChatClient, LlmQuizService, LlmSummarizer, WhisperClient};
use lectio_storage::{LocalMediaStore, MediaStore};
use lectio_worker::{TaskHandlerContext, TaskQueue, TaskQueueConfig};
use sqlx::PgPool;
use std::sync::{Arc, Weak};

/// Initialize all services and repositories, returning the application state and the
/// running task queue.
pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
) -> Result<(Arc<AppState>, Arc<TaskQueue>)> {
    let videos: Arc<dyn VideoStore> = Arc::new(PgVideoRepository::new(pool.clone()));
    let classes = Arc::new(PgClassRepository::new(pool.clone()));
    let task_repository = TaskRepository::new(pool.clone());

    let media_store = LocalMediaStore::new(
        config.media_storage_path().clone(),
        config.media_base_url().to_string(),
    )
    .await
    .context("Failed to initialize media storage")?;
    tracing::info!(
        path = %config.media_storage_path().display(),
        base_url = %config.media_base_url(),
        "Local media storage initialized"
    );

    let media_store: Arc<dyn MediaStore> = Arc::new(media_store);
    let media = MediaState {
        store: media_store.clone(),
        validator: VideoValidator::new(
            config.max_video_size_bytes(),
            config.video_allowed_extensions().to_vec(),
            config.video_allowed_content_types().to_vec(),
        ),
    };

    let audio = FfmpegAudioExtractor::new(config.ffmpeg_path(), config.ffprobe_path())
        .context("Failed to initialize audio extraction")?;
    let speech = WhisperClient::new(config.stt_api_url(), config.stt_api_key());
    let summarizer = LlmSummarizer::new(ChatClient::new(config.summary_llm()));
    let quiz_service = LlmQuizService::new(ChatClient::new(config.quiz_llm()));

    let pipeline = Arc::new(PipelineOrchestrator::new(
        videos.clone(),
        Arc::new(audio),
        Arc::new(speech),
        Arc::new(summarizer),
        Arc::new(CarryForwardStitcher),
        PipelineConfig {
            chunk_delay: config.transcription_chunk_delay(),
        },
    )
    .with_thumbnails(media_store));
    let quiz = Arc::new(QuizOrchestrator::new(
        videos.clone(),
        Arc::new(quiz_service),
    ));

    let task_queue_config = TaskQueueConfig {
        max_workers: config.task_queue_max_workers(),
        poll_interval_ms: config.task_queue_poll_interval_ms(),
        default_timeout_seconds: config.task_queue_default_timeout_seconds(),
        max_retries: config.task_queue_max_retries(),
        stale_task_reap_interval_secs: config.stale_task_reap_interval_secs(),
        stale_task_grace_period_secs: config.stale_task_grace_period_secs(),
        ..TaskQueueConfig::default()
    };

    // The queue holds a weak handle on the state that dispatches its tasks.
    let mut task_queue = None;
    let state = Arc::new_cyclic(|weak: &Weak<AppState>| {
        let context: Weak<dyn TaskHandlerContext> = weak.clone();
        let queue = Arc::new(TaskQueue::new(
            task_repository,
            task_queue_config,
            context,
            Some(pool.clone()),
        ));
        task_queue = Some(queue.clone());

        AppState {
            config: config.clone(),
            pool: Some(pool),
            videos,
            classes,
            media,
            tasks: queue,
            pipeline,
            quiz,
        }
    });
    let task_queue = task_queue.context("Task queue was not created")?;

    tracing::info!(
        max_workers = config.task_queue_max_workers(),
        max_retries = config.task_queue_max_retries(),
        "Task queue started"
    );

    Ok((state, task_queue))
}
