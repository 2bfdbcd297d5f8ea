use axum::{
    extract::{Path, State},
    Json,
};
use lectio_core::models::Mcq;
use lectio_processing::QuizRequest;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::member_video;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct QuizResponse {
    pub message: String,
    pub mcqs: Vec<Mcq>,
}

/// Generate a fresh set of questions from the video's summary, replacing any earlier quiz.
#[utoipa::path(
    post,
    path = "/api/v1/videos/{video_id}/generate-quiz",
    tag = "quiz",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Quiz generated", body = QuizResponse),
        (status = 400, description = "Invalid parameters or no summary yet", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 409, description = "Quiz was regenerated concurrently", body = ErrorResponse),
        (status = 500, description = "Failed to generate quiz", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<QuizRequest>,
) -> Result<Json<QuizResponse>, HttpAppError> {
    let request = request.validate()?;
    member_video(&state, video_id, user.user_id).await?;

    let mcqs = state.quiz.generate_quiz(video_id, &request).await?;

    Ok(Json(QuizResponse {
        message: "Quiz generated successfully".to_string(),
        mcqs,
    }))
}
