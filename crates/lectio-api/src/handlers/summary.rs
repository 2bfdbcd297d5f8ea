//! Manual summary editing by the class creator.

use axum::{
    extract::{Path, State},
    Json,
};
use lectio_core::models::{SummaryItem, SummaryItemInput};
use lectio_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::access::creator_video;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSummaryRequest {
    #[validate(nested)]
    pub summary: Vec<SummaryItemInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub message: String,
    pub summary: Vec<SummaryItem>,
}

async fn store_summary(
    state: &AppState,
    video_id: Uuid,
    summary: Vec<SummaryItem>,
    message: &str,
) -> Result<Json<SummaryResponse>, HttpAppError> {
    let summary = state
        .videos
        .replace_summary(video_id, summary)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    Ok(Json(SummaryResponse {
        message: message.to_string(),
        summary,
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/videos/{video_id}/summary",
    tag = "summary",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    request_body = UpdateSummaryRequest,
    responses(
        (status = 200, description = "Summary replaced", body = SummaryResponse),
        (status = 400, description = "A topic is missing its title or content", body = ErrorResponse),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id, topics = request.summary.len()))]
pub async fn update_summary(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateSummaryRequest>,
) -> Result<Json<SummaryResponse>, HttpAppError> {
    let video = creator_video(
        &state,
        video_id,
        user.user_id,
        "Not authorized to edit summary",
    )
    .await?;
    request.validate()?;

    let summary = request.summary.into_iter().map(SummaryItem::from).collect();
    store_summary(&state, video.id, summary, "Summary updated successfully").await
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{video_id}/summary/{topic_id}",
    tag = "summary",
    params(
        ("video_id" = Uuid, Path, description = "Video ID"),
        ("topic_id" = Uuid, Path, description = "Summary topic ID")
    ),
    responses(
        (status = 200, description = "Topic removed", body = SummaryResponse),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Video or topic not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_summary_topic(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path((video_id, topic_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SummaryResponse>, HttpAppError> {
    let video = creator_video(
        &state,
        video_id,
        user.user_id,
        "Not authorized to delete topic",
    )
    .await?;

    let before = video.summary.len();
    let summary: Vec<SummaryItem> = video
        .summary
        .into_iter()
        .filter(|topic| topic.id != topic_id)
        .collect();
    if summary.len() == before {
        return Err(AppError::NotFound("Topic not found".to_string()).into());
    }

    store_summary(&state, video.id, summary, "Topic deleted successfully").await
}
