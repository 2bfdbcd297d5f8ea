use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lectio_core::models::{CreateNoteRequest, Note};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::access::member_video;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/videos/{video_id}/notes",
    tag = "notes",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Heading or content missing", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_note(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), HttpAppError> {
    request.validate()?;
    let video = member_video(&state, video_id, user.user_id).await?;

    let note = state
        .videos
        .add_note(
            video.id,
            user.user_id,
            request.heading.trim(),
            request.content.trim(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

/// Notes are private: only the caller's own notes are returned.
#[utoipa::path(
    get,
    path = "/api/v1/videos/{video_id}/notes",
    tag = "notes",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "The caller's notes on this video", body = Vec<Note>),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
) -> Result<Json<Vec<Note>>, HttpAppError> {
    let video = member_video(&state, video_id, user.user_id).await?;
    let notes = state.videos.list_notes(video.id, user.user_id).await?;
    Ok(Json(notes))
}
