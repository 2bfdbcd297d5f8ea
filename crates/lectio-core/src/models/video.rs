use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::status::ProcessingStatus;

/// One topic of a lecture summary. Order within a video's summary is chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
}

impl SummaryItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// A multiple-choice question. Always exactly four options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mcq {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: u8,
    pub explanation: String,
}

pub const MCQ_OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub class_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub media_url: String,
    /// Opaque media-store identifier recorded at upload, used for deletion.
    pub asset_id: String,
    pub thumbnail_url: Option<String>,
    /// Media-store identifier of the generated thumbnail, used for deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_asset_id: Option<String>,
    pub duration_seconds: Option<f64>,
    pub transcription: Option<String>,
    pub summary: Vec<SummaryItem>,
    pub mcqs: Vec<Mcq>,
    pub processing_status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
    pub mcq_generation_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Video {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;

        Ok(Video {
            id: row.try_get("id")?,
            class_id: row.try_get("class_id")?,
            creator_id: row.try_get("creator_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            media_url: row.try_get("media_url")?,
            asset_id: row.try_get("asset_id")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            thumbnail_asset_id: row.try_get("thumbnail_asset_id")?,
            duration_seconds: row.try_get("duration_seconds")?,
            transcription: row.try_get("transcription")?,
            summary: row.try_get::<Json<Vec<SummaryItem>>, _>("summary")?.0,
            mcqs: row.try_get::<Json<Vec<Mcq>>, _>("mcqs")?.0,
            processing_status: row.try_get("processing_status")?,
            processing_error: row.try_get("processing_error")?,
            mcq_generation_status: row.try_get("mcq_generation_status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fields set when a video record is first created by the upload handler.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub class_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub asset_id: String,
    /// Set when the media store can report it; otherwise filled in by the pipeline.
    pub duration_seconds: Option<f64>,
}

/// Facts about the stored media learned by the pipeline once the audio is extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDetails {
    pub duration_seconds: f64,
    /// `None` keeps the stored thumbnail.
    pub thumbnail: Option<StoredThumbnail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredThumbnail {
    pub url: String,
    pub asset_id: String,
}

/// A single atomic write of the pipeline-owned fields.
///
/// `status` must come from [`ProcessingStatus::transition`]. `error` is written as-is,
/// so non-failure updates clear any previous error.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineUpdate {
    pub status: ProcessingStatus,
    pub error: Option<String>,
    pub summary: Option<Vec<SummaryItem>>,
    /// Clears `transcription` and `summary` (used by reprocessing).
    pub clear_outputs: bool,
}

impl PipelineUpdate {
    pub fn status(status: ProcessingStatus) -> Self {
        Self {
            status,
            error: None,
            summary: None,
            clear_outputs: false,
        }
    }

    pub fn failed(status: ProcessingStatus, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::status(status)
        }
    }

    pub fn completed(status: ProcessingStatus, summary: Vec<SummaryItem>) -> Self {
        Self {
            summary: Some(summary),
            ..Self::status(status)
        }
    }

    pub fn reset(status: ProcessingStatus) -> Self {
        Self {
            clear_outputs: true,
            ..Self::status(status)
        }
    }
}

/// A single atomic write of the quiz-owned fields.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizUpdate {
    pub status: ProcessingStatus,
    /// `Some` fully replaces the stored list.
    pub mcqs: Option<Vec<Mcq>>,
}

/// Client-supplied summary topic for manual edits.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SummaryItemInput {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

impl From<SummaryItemInput> for SummaryItem {
    fn from(input: SummaryItemInput) -> Self {
        SummaryItem::new(input.title.trim(), input.content.trim())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchResults {
    pub title_matches: Vec<Video>,
    pub topic_matches: Vec<Video>,
}
