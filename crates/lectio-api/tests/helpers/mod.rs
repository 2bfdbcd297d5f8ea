#![allow(dead_code)]

//! Router-level test harness backed by in-memory stores and stub services.

pub mod auth;
pub mod fixtures;
pub mod stubs;

use axum_test::TestServer;
use lectio_api::setup::routes::setup_routes;
use lectio_api::state::{AppState, MediaState};
use lectio_api::validation::VideoValidator;
use lectio_core::{BaseConfig, Config, LectioConfig, LlmEndpoint};
use lectio_db::test_helpers::{InMemoryClassStore, InMemoryVideoStore};
use lectio_processing::{CarryForwardStitcher, PipelineConfig, PipelineOrchestrator, QuizOrchestrator};
use lectio_services::SpeechToText;
use lectio_storage::{LocalMediaStore, MediaStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use stubs::{RecordingSubmitter, StubAudioExtractor, StubQuizService, StubSpeech, StubSummarizer};

pub use auth::TEST_JWT_SECRET;

/// Returns the versioned API path: `api_path("/classes")` -> `/api/v1/classes`.
pub fn api_path(path: &str) -> String {
    format!("{}{}", lectio_api::constants::API_PREFIX, path)
}

pub const MAX_VIDEO_BYTES: usize = 64 * 1024;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub videos: InMemoryVideoStore,
    pub classes: InMemoryClassStore,
    pub tasks: Arc<RecordingSubmitter>,
    pub quiz: Arc<StubQuizService>,
    pub media_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

fn test_config(media_dir: &TempDir) -> Config {
    let llm = LlmEndpoint {
        url: "http://127.0.0.1:9/v1".to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
    };
    Config::new(LectioConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            database_url: "postgres://unused".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: 1,
            jwt_secret: TEST_JWT_SECRET.to_string(),
            environment: "test".to_string(),
            log_format: "text".to_string(),
        },
        media_storage_path: media_dir.path().to_path_buf(),
        media_base_url: "http://localhost/media".to_string(),
        max_video_size_bytes: MAX_VIDEO_BYTES,
        video_allowed_extensions: vec!["mp4".to_string(), "webm".to_string()],
        video_allowed_content_types: vec!["video/mp4".to_string(), "video/webm".to_string()],
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
        stt_api_url: "http://127.0.0.1:9/stt".to_string(),
        stt_api_key: "test-key".to_string(),
        summary_llm: llm.clone(),
        quiz_llm: llm,
        transcription_chunk_delay_ms: 0,
        task_queue_max_workers: 1,
        task_queue_poll_interval_ms: 1000,
        task_queue_default_timeout_seconds: 60,
        task_queue_max_retries: 0,
        stale_task_reap_interval_secs: 0,
        stale_task_grace_period_secs: 0,
    })
}

/// Build the full router over fresh in-memory stores.
///
/// The stub pipeline reports 12 minutes of audio with a thumbnail frame and two topics
/// per transcript chunk.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_speech(Arc::new(StubSpeech)).await
}

/// Like [`setup_test_app`] with a custom speech-to-text service.
pub async fn setup_test_app_with_speech(speech: Arc<dyn SpeechToText>) -> TestApp {
    let media_dir = TempDir::new().expect("temp media dir");
    let config = test_config(&media_dir);

    let videos = InMemoryVideoStore::new();
    let classes = InMemoryClassStore::new();
    let tasks = Arc::new(RecordingSubmitter::default());
    let quiz = Arc::new(StubQuizService::default());

    let media_store = LocalMediaStore::new(
        media_dir.path().to_path_buf(),
        config.media_base_url().to_string(),
    )
    .await
    .expect("local media store");
    let media_store: Arc<dyn MediaStore> = Arc::new(media_store);

    let pipeline = PipelineOrchestrator::new(
        Arc::new(videos.clone()),
        Arc::new(StubAudioExtractor { minutes: 12.0 }),
        speech,
        Arc::new(StubSummarizer { topics_per_chunk: 2 }),
        Arc::new(CarryForwardStitcher),
        PipelineConfig {
            chunk_delay: Duration::ZERO,
        },
    )
    .with_thumbnails(media_store.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        pool: None,
        videos: Arc::new(videos.clone()),
        classes: Arc::new(classes.clone()),
        media: MediaState {
            store: media_store,
            validator: VideoValidator::new(
                config.max_video_size_bytes(),
                config.video_allowed_extensions().to_vec(),
                config.video_allowed_content_types().to_vec(),
            ),
        },
        tasks: tasks.clone(),
        pipeline: Arc::new(pipeline),
        quiz: Arc::new(QuizOrchestrator::new(
            Arc::new(videos.clone()),
            quiz.clone(),
        )),
    });

    let router = setup_routes(&config, state.clone()).expect("router");
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        state,
        videos,
        classes,
        tasks,
        quiz,
        media_dir,
    }
}
