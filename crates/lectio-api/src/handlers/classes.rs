//! Classes: creation, join codes, membership and deletion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lectio_core::models::{Class, CreateClassRequest, JoinClassRequest};
use lectio_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::access::find_class;
use super::MessageResponse;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassResponse {
    pub message: String,
    pub class: Class,
}

impl ClassResponse {
    fn new(message: &str, class: Class) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            class,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassListResponse {
    pub message: String,
    pub classes: Vec<Class>,
}

#[utoipa::path(
    post,
    path = "/api/v1/classes",
    tag = "classes",
    request_body = CreateClassRequest,
    responses(
        (status = 201, description = "Class created; the caller is its creator and first member", body = ClassResponse),
        (status = 400, description = "Missing title", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn create_class(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    ValidatedJson(request): ValidatedJson<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>), HttpAppError> {
    request.validate()?;
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title is required".to_string()).into());
    }

    let class = state.classes.create_class(title, user.user_id).await?;
    tracing::info!(class_id = %class.id, code = %class.code, "Class created");

    Ok((
        StatusCode::CREATED,
        ClassResponse::new("Class created successfully!", class),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/classes/join",
    tag = "classes",
    request_body = JoinClassRequest,
    responses(
        (status = 200, description = "Joined the class", body = ClassResponse),
        (status = 400, description = "Malformed code or already a member", body = ErrorResponse),
        (status = 404, description = "No class with this code", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn join_class(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    ValidatedJson(request): ValidatedJson<JoinClassRequest>,
) -> Result<Json<ClassResponse>, HttpAppError> {
    let code = request.class_code.trim().to_uppercase();
    JoinClassRequest {
        class_code: code.clone(),
    }
    .validate()?;

    let class = state
        .classes
        .find_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;

    if class.is_member(user.user_id) {
        return Err(
            AppError::BadRequest("You are already a member of this class".to_string()).into(),
        );
    }

    state.classes.add_member(class.id, user.user_id).await?;
    let class = find_class(&state, class.id).await?;

    Ok(ClassResponse::new("Successfully joined the class", class))
}

#[utoipa::path(
    get,
    path = "/api/v1/classes",
    tag = "classes",
    responses(
        (status = 200, description = "Classes the caller belongs to, newest first", body = ClassListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<Json<ClassListResponse>, HttpAppError> {
    let classes = state.classes.list_user_classes(user.user_id).await?;
    Ok(Json(ClassListResponse {
        message: "User classes retrieved successfully".to_string(),
        classes,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classes/{class_id}/leave",
    tag = "classes",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 200, description = "Left the class", body = ClassResponse),
        (status = 400, description = "Not a member, or the caller created the class", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn leave_class(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ClassResponse>, HttpAppError> {
    let class = find_class(&state, class_id).await?;

    if class.is_creator(user.user_id) {
        return Err(AppError::BadRequest(
            "Class creators cannot leave their own class".to_string(),
        )
        .into());
    }
    if !class.is_member(user.user_id) {
        return Err(
            AppError::BadRequest("You are not a member of this class".to_string()).into(),
        );
    }

    state.classes.remove_member(class.id, user.user_id).await?;
    let class = find_class(&state, class.id).await?;

    Ok(ClassResponse::new("You have left the class", class))
}

/// Deletes the class, its videos and their stored media.
#[utoipa::path(
    delete,
    path = "/api/v1/classes/{class_id}",
    tag = "classes",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 200, description = "Class deleted", body = MessageResponse),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_class(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(class_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let class = find_class(&state, class_id).await?;
    if !class.is_creator(user.user_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this class".to_string(),
        )
        .into());
    }

    let videos = state.videos.list_class_videos(class.id).await?;
    for video in &videos {
        if let Err(e) = state.media.store.delete(&video.asset_id).await {
            tracing::warn!(
                error = %e,
                video_id = %video.id,
                asset_id = %video.asset_id,
                "Failed to delete media asset of class video"
            );
        }
        if let Some(thumbnail) = &video.thumbnail_asset_id {
            if let Err(e) = state.media.store.delete(thumbnail).await {
                tracing::warn!(error = %e, video_id = %video.id, asset_id = %thumbnail, "Failed to delete video thumbnail");
            }
        }
    }

    if !state.classes.delete_class(class.id).await? {
        return Err(AppError::NotFound("Class not found".to_string()).into());
    }

    tracing::info!(class_id = %class.id, videos = videos.len(), "Class deleted");
    Ok(Json(MessageResponse::new("Class deleted successfully")))
}
