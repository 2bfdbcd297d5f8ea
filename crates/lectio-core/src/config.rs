//! Configuration module
//!
//! Settings are read from the environment (after loading a `.env` file if present) by
//! [`Config::from_env`] and checked by [`Config::validate`] before the server starts.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_VIDEO_SIZE_MB: usize = 100;
const TRANSCRIPTION_CHUNK_DELAY_MS: u64 = 1000;
const TASK_QUEUE_MAX_WORKERS: usize = 4;
const TASK_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const TASK_QUEUE_DEFAULT_TIMEOUT_SECS: i32 = 3600;
const TASK_QUEUE_MAX_RETRIES: i32 = 3;
const STALE_TASK_REAP_INTERVAL_SECS: u64 = 60;
const STALE_TASK_GRACE_PERIOD_SECS: i64 = 300;

const DEFAULT_SUMMARY_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.3";
const DEFAULT_QUIZ_MODEL: &str = "llama-3.3-70b-versatile";

/// Server, database and auth settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
    /// `json` for machine-readable logs, anything else for the human format.
    pub log_format: String,
}

/// One OpenAI-compatible chat-completions endpoint.
#[derive(Clone, Debug)]
pub struct LlmEndpoint {
    pub url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct LectioConfig {
    pub base: BaseConfig,
    // Media storage
    pub media_storage_path: PathBuf,
    pub media_base_url: String,
    pub max_video_size_bytes: usize,
    pub video_allowed_extensions: Vec<String>,
    pub video_allowed_content_types: Vec<String>,
    // Transcoding
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    // External services
    pub stt_api_url: String,
    pub stt_api_key: String,
    pub summary_llm: LlmEndpoint,
    pub quiz_llm: LlmEndpoint,
    pub transcription_chunk_delay_ms: u64,
    // Task queue
    pub task_queue_max_workers: usize,
    pub task_queue_poll_interval_ms: u64,
    pub task_queue_default_timeout_seconds: i32,
    pub task_queue_max_retries: i32,
    /// 0 disables the reaper.
    pub stale_task_reap_interval_secs: u64,
    pub stale_task_grace_period_secs: i64,
}

#[derive(Clone, Debug)]
pub struct Config(Box<LectioConfig>);

impl Config {
    pub fn new(inner: LectioConfig) -> Self {
        Self(Box::new(inner))
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        LectioConfig::from_env().map(Self::new)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.0.base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.base.db_max_connections
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.0.base.db_timeout_seconds)
    }

    pub fn jwt_secret(&self) -> &str {
        &self.0.base.jwt_secret
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn is_production(&self) -> bool {
        is_production_name(&self.0.base.environment)
    }

    pub fn json_logs(&self) -> bool {
        self.0.base.log_format.eq_ignore_ascii_case("json")
    }

    pub fn media_storage_path(&self) -> &PathBuf {
        &self.0.media_storage_path
    }

    pub fn media_base_url(&self) -> &str {
        &self.0.media_base_url
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.0.max_video_size_bytes
    }

    pub fn video_allowed_extensions(&self) -> &[String] {
        &self.0.video_allowed_extensions
    }

    pub fn video_allowed_content_types(&self) -> &[String] {
        &self.0.video_allowed_content_types
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.0.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.0.ffprobe_path
    }

    pub fn stt_api_url(&self) -> &str {
        &self.0.stt_api_url
    }

    pub fn stt_api_key(&self) -> &str {
        &self.0.stt_api_key
    }

    pub fn summary_llm(&self) -> &LlmEndpoint {
        &self.0.summary_llm
    }

    pub fn quiz_llm(&self) -> &LlmEndpoint {
        &self.0.quiz_llm
    }

    pub fn transcription_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.0.transcription_chunk_delay_ms)
    }

    pub fn task_queue_max_workers(&self) -> usize {
        self.0.task_queue_max_workers
    }

    pub fn task_queue_poll_interval_ms(&self) -> u64 {
        self.0.task_queue_poll_interval_ms
    }

    pub fn task_queue_default_timeout_seconds(&self) -> i32 {
        self.0.task_queue_default_timeout_seconds
    }

    pub fn task_queue_max_retries(&self) -> i32 {
        self.0.task_queue_max_retries
    }

    pub fn stale_task_reap_interval_secs(&self) -> u64 {
        self.0.stale_task_reap_interval_secs
    }

    pub fn stale_task_grace_period_secs(&self) -> i64 {
        self.0.stale_task_grace_period_secs
    }

    /// How long a video may sit in `processing` without an update before no live run
    /// can still own it.
    pub fn stale_processing_after(&self) -> Duration {
        let secs = i64::from(self.0.task_queue_default_timeout_seconds.max(0))
            + self.0.stale_task_grace_period_secs.max(0);
        Duration::from_secs(secs as u64)
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn llm_endpoint(prefix: &str, default_model: &str) -> Result<LlmEndpoint, anyhow::Error> {
    Ok(LlmEndpoint {
        url: env::var(format!("{}_URL", prefix))
            .map_err(|_| anyhow::anyhow!("{}_URL must be set", prefix))?,
        api_key: env::var(format!("{}_API_KEY", prefix))
            .map_err(|_| anyhow::anyhow!("{}_API_KEY must be set", prefix))?,
        model: env::var(format!("{}_MODEL", prefix)).unwrap_or_else(|_| default_model.to_string()),
    })
}

impl LectioConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            environment,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        let max_video_size_mb = env::var("MAX_VIDEO_SIZE_MB")
            .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_VIDEO_SIZE_MB);

        Ok(Self {
            base,
            media_storage_path: PathBuf::from(
                env::var("MEDIA_STORAGE_PATH").unwrap_or_else(|_| "./media".to_string()),
            ),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/media".to_string()),
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            video_allowed_extensions: parse_list(
                &env::var("VIDEO_ALLOWED_EXTENSIONS").unwrap_or_else(|_| "mp4,mov,avi".to_string()),
            ),
            video_allowed_content_types: parse_list(
                &env::var("VIDEO_ALLOWED_CONTENT_TYPES").unwrap_or_else(|_| {
                    "video/mp4,video/quicktime,video/x-msvideo,video/avi".to_string()
                }),
            ),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            stt_api_url: env::var("STT_API_URL")
                .map_err(|_| anyhow::anyhow!("STT_API_URL must be set"))?,
            stt_api_key: env::var("STT_API_KEY")
                .map_err(|_| anyhow::anyhow!("STT_API_KEY must be set"))?,
            summary_llm: llm_endpoint("SUMMARY_LLM", DEFAULT_SUMMARY_MODEL)?,
            quiz_llm: llm_endpoint("QUIZ_LLM", DEFAULT_QUIZ_MODEL)?,
            transcription_chunk_delay_ms: env::var("TRANSCRIPTION_CHUNK_DELAY_MS")
                .unwrap_or_else(|_| TRANSCRIPTION_CHUNK_DELAY_MS.to_string())
                .parse()
                .unwrap_or(TRANSCRIPTION_CHUNK_DELAY_MS),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_poll_interval_ms: env::var("TASK_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| TASK_QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_POLL_INTERVAL_MS),
            task_queue_default_timeout_seconds: env::var("TASK_QUEUE_DEFAULT_TIMEOUT_SECS")
                .unwrap_or_else(|_| TASK_QUEUE_DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_DEFAULT_TIMEOUT_SECS),
            task_queue_max_retries: env::var("TASK_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_RETRIES),
            stale_task_reap_interval_secs: env::var("STALE_TASK_REAP_INTERVAL_SECS")
                .unwrap_or_else(|_| STALE_TASK_REAP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(STALE_TASK_REAP_INTERVAL_SECS),
            stale_task_grace_period_secs: env::var("STALE_TASK_GRACE_PERIOD_SECS")
                .unwrap_or_else(|_| STALE_TASK_GRACE_PERIOD_SECS.to_string())
                .parse()
                .unwrap_or(STALE_TASK_GRACE_PERIOD_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.base.database_url.starts_with("postgres://")
            || self.base.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.max_video_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_VIDEO_SIZE_MB must be greater than 0"));
        }

        if self.video_allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "VIDEO_ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        for (name, url) in [
            ("STT_API_URL", self.stt_api_url.as_str()),
            ("SUMMARY_LLM_URL", self.summary_llm.url.as_str()),
            ("QUIZ_LLM_URL", self.quiz_llm.url.as_str()),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!("{} must be an http(s) URL", name));
            }
        }

        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_MAX_WORKERS must be greater than 0"
            ));
        }

        if self.task_queue_default_timeout_seconds <= 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_DEFAULT_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.task_queue_max_retries < 0 {
            return Err(anyhow::anyhow!("TASK_QUEUE_MAX_RETRIES cannot be negative"));
        }

        Ok(())
    }
}
