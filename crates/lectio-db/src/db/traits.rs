//! Content store abstractions.
//!
//! The orchestrators and HTTP handlers only see these traits, so they can run against
//! Postgres in production and against in-memory stores in tests.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use lectio_core::models::{
    Class, MediaDetails, NewVideo, Note, PipelineUpdate, QuizUpdate, SummaryItem, Video,
};
use lectio_core::ProcessingStatus;

#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(&self, new_video: NewVideo) -> Result<Video>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>>;

    /// Videos of a class, newest first.
    async fn list_class_videos(&self, class_id: Uuid) -> Result<Vec<Video>>;

    /// Returns `false` when no such video existed.
    async fn delete_video(&self, id: Uuid) -> Result<bool>;

    async fn save_transcription(&self, id: Uuid, transcription: &str) -> Result<()>;

    /// Record the measured duration and, when one was generated, the thumbnail.
    async fn save_media_details(&self, id: Uuid, details: MediaDetails) -> Result<()>;

    /// Write the pipeline-owned fields only if `processing_status` currently equals
    /// `expected`. Returns whether a row was updated.
    async fn apply_pipeline_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: PipelineUpdate,
    ) -> Result<bool>;

    /// Write the quiz-owned fields only if `mcq_generation_status` currently equals
    /// `expected`. Returns whether a row was updated.
    async fn apply_quiz_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: QuizUpdate,
    ) -> Result<bool>;

    /// Replace the whole summary. Returns the stored summary, or `None` if the video
    /// does not exist.
    async fn replace_summary(
        &self,
        id: Uuid,
        summary: Vec<SummaryItem>,
    ) -> Result<Option<Vec<SummaryItem>>>;

    /// Videos of a class whose title or any summary topic title contains `query`,
    /// case-insensitively and literally. Newest first.
    async fn search_class_videos(&self, class_id: Uuid, query: &str) -> Result<Vec<Video>>;

    async fn add_note(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        heading: &str,
        content: &str,
    ) -> Result<Note>;

    /// Notes written by `user_id` on a video, oldest first.
    async fn list_notes(&self, video_id: Uuid, user_id: Uuid) -> Result<Vec<Note>>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    /// Create a class with a fresh unique join code. The creator becomes a member.
    async fn create_class(&self, title: &str, creator_id: Uuid) -> Result<Class>;

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Class>>;

    /// Add a member. Adding an existing member is a no-op.
    async fn add_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()>;

    /// Remove a member. Removing a non-member is a no-op.
    async fn remove_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()>;

    /// Classes the user is a member of, newest first.
    async fn list_user_classes(&self, user_id: Uuid) -> Result<Vec<Class>>;

    /// Returns `false` when no such class existed. Videos and notes cascade.
    async fn delete_class(&self, id: Uuid) -> Result<bool>;
}
