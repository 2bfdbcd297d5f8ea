//! Quiz generation from a processed lecture's summary.
//!
//! Independent of the pipeline run: it owns `mcq_generation_status` and may be invoked
//! any number of times, each successful call replacing the stored questions.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use lectio_core::models::{Mcq, QuizUpdate};
use lectio_core::{AppError, StatusEvent, TransitionError};
use lectio_db::VideoStore;
use lectio_services::{Difficulty, QuizService};

pub const MIN_QUESTIONS: i64 = 1;
pub const MAX_QUESTIONS: i64 = 20;

const NO_INSTRUCTIONS: &str = "No additional instructions.";

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Missing required fields: numberOfQuestions and difficulty are required")]
    MissingFields,

    #[error("numberOfQuestions must be between 1 and 20")]
    InvalidCount,

    #[error("difficulty must be one of: easy, medium, hard")]
    InvalidDifficulty,

    #[error("Video not found")]
    VideoNotFound,

    #[error("Video does not have a summary to generate quiz from")]
    NoSummary,

    #[error("Quiz was regenerated concurrently; reload the video to see the latest quiz")]
    Superseded,

    #[error("{0}")]
    Generation(String),

    #[error("Content store error: {0:#}")]
    Store(#[source] anyhow::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::MissingFields
            | QuizError::InvalidCount
            | QuizError::InvalidDifficulty
            | QuizError::NoSummary => AppError::BadRequest(err.to_string()),
            QuizError::VideoNotFound => AppError::NotFound(err.to_string()),
            QuizError::Superseded => AppError::Conflict(err.to_string()),
            QuizError::Generation(details) => AppError::QuizGeneration(details),
            QuizError::Store(e) => AppError::QuizGeneration(format!("{:#}", e)),
            QuizError::Transition(e) => e.into(),
        }
    }
}

/// Body of a quiz generation request, as sent by clients.
///
/// `numberOfQuestions` may be a JSON number or a numeric string.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    #[schema(value_type = Option<u32>, example = 5)]
    pub number_of_questions: Option<Value>,
    #[schema(example = "medium")]
    pub difficulty: Option<String>,
    pub additional_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidQuizRequest {
    pub count: usize,
    pub difficulty: Difficulty,
    pub instructions: String,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl QuizRequest {
    /// Checks run in order: presence, count range, difficulty.
    pub fn validate(&self) -> Result<ValidQuizRequest, QuizError> {
        let count = self
            .number_of_questions
            .as_ref()
            .filter(|v| !is_blank(v))
            .ok_or(QuizError::MissingFields)?;
        let difficulty = self
            .difficulty
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(QuizError::MissingFields)?;

        let count = parse_count(count)
            .filter(|c| (MIN_QUESTIONS..=MAX_QUESTIONS).contains(c))
            .ok_or(QuizError::InvalidCount)?;

        let difficulty = difficulty
            .parse::<Difficulty>()
            .map_err(|_| QuizError::InvalidDifficulty)?;

        let instructions = self
            .additional_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_INSTRUCTIONS)
            .to_string();

        Ok(ValidQuizRequest {
            count: count as usize,
            difficulty,
            instructions,
        })
    }
}

pub struct QuizOrchestrator {
    videos: Arc<dyn VideoStore>,
    quiz: Arc<dyn QuizService>,
}

impl QuizOrchestrator {
    pub fn new(videos: Arc<dyn VideoStore>, quiz: Arc<dyn QuizService>) -> Self {
        Self { videos, quiz }
    }

    /// Generate and store a fresh quiz for a video with a summary.
    ///
    /// On failure `mcq_generation_status` is set to `failed` and the previous questions
    /// are left untouched.
    #[tracing::instrument(skip(self, request), fields(count = request.count, difficulty = %request.difficulty))]
    pub async fn generate_quiz(
        &self,
        video_id: Uuid,
        request: &ValidQuizRequest,
    ) -> Result<Vec<Mcq>, QuizError> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(QuizError::Store)?
            .ok_or(QuizError::VideoNotFound)?;

        if video.summary.is_empty() {
            return Err(QuizError::NoSummary);
        }

        let current = video.mcq_generation_status;
        let processing = current.restart()?;
        let started = self
            .videos
            .apply_quiz_update(
                video_id,
                current,
                QuizUpdate {
                    status: processing,
                    mcqs: None,
                },
            )
            .await
            .map_err(QuizError::Store)?;
        if !started {
            return Err(QuizError::Superseded);
        }

        let generated = self
            .quiz
            .generate_mcqs(
                &video.summary,
                request.count,
                request.difficulty,
                &request.instructions,
            )
            .await;

        match generated {
            Ok(mcqs) => {
                let completed = processing.transition(StatusEvent::Succeed)?;
                let stored = self
                    .videos
                    .apply_quiz_update(
                        video_id,
                        processing,
                        QuizUpdate {
                            status: completed,
                            mcqs: Some(mcqs.clone()),
                        },
                    )
                    .await
                    .map_err(QuizError::Store)?;
                if !stored {
                    return Err(QuizError::Superseded);
                }

                tracing::info!(questions = mcqs.len(), "Quiz generated");
                Ok(mcqs)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Quiz generation failed");

                let failed = processing.transition(StatusEvent::Fail)?;
                if let Err(store_err) = self
                    .videos
                    .apply_quiz_update(
                        video_id,
                        processing,
                        QuizUpdate {
                            status: failed,
                            mcqs: None,
                        },
                    )
                    .await
                {
                    tracing::error!(error = %store_err, "Failed to record quiz generation failure");
                }

                Err(QuizError::Generation(format!("{:#}", e)))
            }
        }
    }
}
