//! Application state shared by handlers and the task dispatcher.
//!
//! Every collaborator sits behind a trait object so the router can be exercised with
//! in-memory stores and stub services.

use lectio_core::Config;
use lectio_db::{ClassStore, VideoStore};
use lectio_processing::{PipelineOrchestrator, QuizOrchestrator};
use lectio_storage::MediaStore;
use lectio_worker::TaskSubmitter;
use sqlx::PgPool;
use std::sync::Arc;

use crate::validation::VideoValidator;

/// Media store plus the rules uploads must satisfy before reaching it.
pub struct MediaState {
    pub store: Arc<dyn MediaStore>,
    pub validator: VideoValidator,
}

pub struct AppState {
    pub config: Config,
    /// `None` when running without Postgres (tests); health then skips the ping.
    pub pool: Option<PgPool>,
    pub videos: Arc<dyn VideoStore>,
    pub classes: Arc<dyn ClassStore>,
    pub media: MediaState,
    pub tasks: Arc<dyn TaskSubmitter>,
    pub pipeline: Arc<PipelineOrchestrator>,
    pub quiz: Arc<QuizOrchestrator>,
}
