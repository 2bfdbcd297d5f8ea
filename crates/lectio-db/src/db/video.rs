use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use lectio_core::models::{
    MediaDetails, NewVideo, Note, PipelineUpdate, QuizUpdate, SummaryItem, Video,
};
use lectio_core::ProcessingStatus;

use crate::db::like_pattern;
use crate::db::traits::VideoStore;

const VIDEO_COLUMNS: &str = r#"
    id,
    class_id,
    creator_id,
    title,
    description,
    media_url,
    asset_id,
    thumbnail_url,
    thumbnail_asset_id,
    duration_seconds,
    transcription,
    summary,
    mcqs,
    processing_status,
    processing_error,
    mcq_generation_status,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for PgVideoRepository {
    #[tracing::instrument(skip(self, new_video), fields(class_id = %new_video.class_id))]
    async fn create_video(&self, new_video: NewVideo) -> Result<Video> {
        let sql = format!(
            r#"
            INSERT INTO videos (
                class_id, creator_id, title, description, media_url, asset_id,
                duration_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {VIDEO_COLUMNS}
            "#
        );
        let video = sqlx::query_as::<Postgres, Video>(&sql)
            .bind(new_video.class_id)
            .bind(new_video.creator_id)
            .bind(&new_video.title)
            .bind(&new_video.description)
            .bind(&new_video.media_url)
            .bind(&new_video.asset_id)
            .bind(new_video.duration_seconds)
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert video")?;

        tracing::info!(video_id = %video.id, "Video record created");

        Ok(video)
    }

    #[tracing::instrument(skip(self))]
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1");
        sqlx::query_as::<Postgres, Video>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch video")
    }

    #[tracing::instrument(skip(self))]
    async fn list_class_videos(&self, class_id: Uuid) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE class_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<Postgres, Video>(&sql)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list class videos")
    }

    #[tracing::instrument(skip(self))]
    async fn delete_video(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete video")?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, transcription), fields(chars = transcription.len()))]
    async fn save_transcription(&self, id: Uuid, transcription: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET transcription = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(transcription)
        .execute(&self.pool)
        .await
        .context("Failed to save transcription")?;

        Ok(())
    }

    #[tracing::instrument(skip(self, details), fields(duration_seconds = details.duration_seconds))]
    async fn save_media_details(&self, id: Uuid, details: MediaDetails) -> Result<()> {
        let (thumbnail_url, thumbnail_asset_id) = match details.thumbnail {
            Some(thumbnail) => (Some(thumbnail.url), Some(thumbnail.asset_id)),
            None => (None, None),
        };
        sqlx::query(
            r#"
            UPDATE videos
            SET duration_seconds = $2,
                thumbnail_url = COALESCE($3, thumbnail_url),
                thumbnail_asset_id = COALESCE($4, thumbnail_asset_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(details.duration_seconds)
        .bind(thumbnail_url)
        .bind(thumbnail_asset_id)
        .execute(&self.pool)
        .await
        .context("Failed to save media details")?;

        Ok(())
    }

    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    async fn apply_pipeline_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: PipelineUpdate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET processing_status = $3,
                processing_error = $4,
                summary = CASE
                    WHEN $6 THEN '[]'::jsonb
                    ELSE COALESCE($5, summary)
                END,
                transcription = CASE WHEN $6 THEN NULL ELSE transcription END,
                updated_at = NOW()
            WHERE id = $1 AND processing_status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(update.status)
        .bind(update.error)
        .bind(update.summary.map(Json))
        .bind(update.clear_outputs)
        .execute(&self.pool)
        .await
        .context("Failed to apply pipeline update")?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::warn!(
                video_id = %id,
                expected = %expected,
                "Pipeline update skipped, stored status did not match"
            );
        }

        Ok(applied)
    }

    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    async fn apply_quiz_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: QuizUpdate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET mcq_generation_status = $3,
                mcqs = COALESCE($4, mcqs),
                updated_at = NOW()
            WHERE id = $1 AND mcq_generation_status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(update.status)
        .bind(update.mcqs.map(Json))
        .execute(&self.pool)
        .await
        .context("Failed to apply quiz update")?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, summary), fields(topics = summary.len()))]
    async fn replace_summary(
        &self,
        id: Uuid,
        summary: Vec<SummaryItem>,
    ) -> Result<Option<Vec<SummaryItem>>> {
        let stored: Option<Json<Vec<SummaryItem>>> = sqlx::query_scalar(
            r#"
            UPDATE videos
            SET summary = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING summary
            "#,
        )
        .bind(id)
        .bind(Json(summary))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to replace summary")?;

        Ok(stored.map(|Json(items)| items))
    }

    #[tracing::instrument(skip(self))]
    async fn search_class_videos(&self, class_id: Uuid, query: &str) -> Result<Vec<Video>> {
        let sql = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE class_id = $1
                AND (
                    title ILIKE $2 ESCAPE '\'
                    OR EXISTS (
                        SELECT 1
                        FROM jsonb_array_elements(summary) AS topic
                        WHERE topic->>'title' ILIKE $2 ESCAPE '\'
                    )
                )
            ORDER BY created_at DESC
            "#
        );
        sqlx::query_as::<Postgres, Video>(&sql)
            .bind(class_id)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await
            .context("Failed to search class videos")
    }

    #[tracing::instrument(skip(self, heading, content))]
    async fn add_note(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        heading: &str,
        content: &str,
    ) -> Result<Note> {
        sqlx::query_as::<Postgres, Note>(
            r#"
            INSERT INTO video_notes (video_id, user_id, heading, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, video_id, user_id, heading, content, created_at
            "#,
        )
        .bind(video_id)
        .bind(user_id)
        .bind(heading)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert note")
    }

    #[tracing::instrument(skip(self))]
    async fn list_notes(&self, video_id: Uuid, user_id: Uuid) -> Result<Vec<Note>> {
        sqlx::query_as::<Postgres, Note>(
            r#"
            SELECT id, video_id, user_id, heading, content, created_at
            FROM video_notes
            WHERE video_id = $1 AND user_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(video_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notes")
    }
}
