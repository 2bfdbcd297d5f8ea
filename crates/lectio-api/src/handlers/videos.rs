//! Lecture video upload, listing, search, deletion and reprocessing.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use lectio_core::models::{
    NewVideo, PipelineUpdate, ProcessVideoPayload, TaskPayload, Video, VideoSearchResults,
};
use lectio_core::{AppError, ProcessingStatus, StatusEvent};
use lectio_storage::MediaKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::access::{creator_video, find_class, member_class, member_video};
use super::MessageResponse;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Returned when a video has been queued for the processing pipeline.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingAccepted {
    pub message: String,
    pub video_id: Uuid,
    /// Always `processing`: the client should poll the video for progress.
    pub status: String,
}

impl ProcessingAccepted {
    fn new(message: &str, video_id: Uuid) -> Self {
        Self {
            message: message.to_string(),
            video_id,
            status: "processing".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    query: Option<String>,
    class_id: Option<String>,
}

struct UploadForm {
    file: Bytes,
    filename: String,
    content_type: String,
    title: String,
    description: String,
    class_id: Uuid,
}

/// Read the `video` file and the text fields of an upload form.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file: Option<(Bytes, String, String)> = None;
    let mut title = None;
    let mut description = None;
    let mut class_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();
        match name.as_str() {
            "video" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Send exactly one field named 'video'".to_string(),
                    ));
                }
                let filename = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;
                file = Some((data, filename, content_type));
            }
            "title" | "description" | "classId" => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read field {}: {}", name, e))
                })?;
                let value = value.trim().to_string();
                match name.as_str() {
                    "title" => title = Some(value),
                    "description" => description = Some(value),
                    _ => class_id = Some(value),
                }
            }
            _ => {}
        }
    }

    let (file, filename, content_type) =
        file.ok_or_else(|| AppError::InvalidInput("No video file provided".to_string()))?;
    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::InvalidInput("title is required".to_string()))?;
    let class_id = class_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("classId is required".to_string()))?
        .parse::<Uuid>()
        .map_err(|_| AppError::InvalidInput("Invalid class ID".to_string()))?;

    Ok(UploadForm {
        file,
        filename,
        content_type,
        title,
        description: description.unwrap_or_default(),
        class_id,
    })
}

async fn submit_processing(state: &AppState, video_id: Uuid) -> Result<(), HttpAppError> {
    let payload = serde_json::to_value(ProcessVideoPayload { video_id })
        .map_err(|e| AppError::Internal(format!("Failed to encode task payload: {}", e)))?;
    let task_id = state
        .tasks
        .submit_task(ProcessVideoPayload::task_type(), payload, None)
        .await?;
    tracing::info!(video_id = %video_id, task_id = %task_id, "Video queued for processing");
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    tag = "videos",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Video stored and queued for processing", body = ProcessingAccepted),
        (status = 400, description = "Invalid form or file type", body = ErrorResponse),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.user_id, video_id = tracing::field::Empty))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProcessingAccepted>), HttpAppError> {
    let form = read_upload_form(multipart).await?;

    let class = find_class(&state, form.class_id).await?;
    if !class.is_creator(user.user_id) {
        return Err(
            AppError::Forbidden("Only class creators can upload videos".to_string()).into(),
        );
    }

    state
        .media
        .validator
        .validate(&form.filename, &form.content_type, form.file.len())?;

    let size = form.file.len();
    let asset = state
        .media
        .store
        .upload(form.file, &form.filename, &form.content_type, MediaKind::Video)
        .await?;
    tracing::debug!(asset_id = %asset.asset_id, bytes = size, "Video stored");

    let new_video = NewVideo {
        class_id: class.id,
        creator_id: user.user_id,
        title: form.title,
        description: form.description,
        media_url: asset.url.clone(),
        asset_id: asset.asset_id.clone(),
        duration_seconds: asset.duration_seconds,
    };
    let video = match state.videos.create_video(new_video).await {
        Ok(video) => video,
        Err(e) => {
            if let Err(cleanup) = state.media.store.delete(&asset.asset_id).await {
                tracing::warn!(error = %cleanup, asset_id = %asset.asset_id, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };
    tracing::Span::current().record("video_id", tracing::field::display(video.id));

    // The video is stored either way; a failed submit leaves it pending for reprocess.
    if let Err(e) = submit_processing(&state, video.id).await {
        tracing::error!(video_id = %video.id, error = ?e, "Failed to queue uploaded video for processing");
    }

    Ok((
        StatusCode::CREATED,
        Json(ProcessingAccepted::new("Video upload successful", video.id)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/class/{class_id}",
    tag = "videos",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 200, description = "Videos of the class, newest first", body = Vec<Video>),
        (status = 403, description = "Not a member of the class", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_class_videos(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(class_id): Path<Uuid>,
) -> Result<Json<Vec<Video>>, HttpAppError> {
    member_class(&state, class_id, user.user_id).await?;

    let videos = state
        .videos
        .list_class_videos(class_id)
        .await?
        .into_iter()
        .map(|mut video| {
            video.processing_error = None;
            video
        })
        .collect();

    Ok(Json(videos))
}

/// Case-insensitive literal match. A video matching by title is never also a topic match.
fn split_search_results(videos: Vec<Video>, query: &str) -> VideoSearchResults {
    let needle = query.to_lowercase();
    let (title_matches, others): (Vec<_>, Vec<_>) = videos
        .into_iter()
        .partition(|v| v.title.to_lowercase().contains(&needle));
    let topic_matches = others
        .into_iter()
        .filter(|v| {
            v.summary
                .iter()
                .any(|item| item.title.to_lowercase().contains(&needle))
        })
        .collect();

    VideoSearchResults {
        title_matches,
        topic_matches,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/search",
    tag = "videos",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matches by title and by summary topic", body = VideoSearchResults),
        (status = 400, description = "Missing search query or class ID", body = ErrorResponse),
        (status = 403, description = "Not a member of the class", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_videos(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Query(params): Query<SearchQuery>,
) -> Result<Json<VideoSearchResults>, HttpAppError> {
    let (Some(query), Some(class_id)) = (
        params.query.filter(|q| !q.trim().is_empty()),
        params.class_id.filter(|c| !c.trim().is_empty()),
    ) else {
        return Err(AppError::BadRequest("Missing search query or class ID".to_string()).into());
    };
    let class_id = class_id
        .trim()
        .parse::<Uuid>()
        .map_err(|_| AppError::BadRequest("Invalid class ID".to_string()))?;

    member_class(&state, class_id, user.user_id).await?;

    let query = query.trim();
    let matches = state.videos.search_class_videos(class_id, query).await?;
    let results = split_search_results(matches, query);
    tracing::debug!(
        title_matches = results.title_matches.len(),
        topic_matches = results.topic_matches.len(),
        "Video search completed"
    );

    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video with pipeline and quiz state", body = Video),
        (status = 403, description = "Not a member of the class", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
) -> Result<Json<Video>, HttpAppError> {
    let video = member_video(&state, video_id, user.user_id).await?;
    Ok(Json(video))
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{video_id}",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video and media asset deleted", body = MessageResponse),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let video = creator_video(
        &state,
        video_id,
        user.user_id,
        "Only class creators can delete videos",
    )
    .await?;

    state.media.store.delete(&video.asset_id).await?;
    if let Some(thumbnail) = &video.thumbnail_asset_id {
        if let Err(e) = state.media.store.delete(thumbnail).await {
            tracing::warn!(error = %e, asset_id = %thumbnail, "Failed to delete video thumbnail");
        }
    }
    if !state.videos.delete_video(video.id).await? {
        return Err(AppError::NotFound("Video not found".to_string()).into());
    }

    tracing::info!(video_id = %video.id, asset_id = %video.asset_id, "Video deleted");
    Ok(Json(MessageResponse::new("Video deleted successfully")))
}

/// A `processing` video untouched for longer than any run may last has no live owner.
fn is_stale(state: &AppState, video: &Video) -> bool {
    (chrono::Utc::now() - video.updated_at)
        .to_std()
        .is_ok_and(|age| age > state.config.stale_processing_after())
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/{video_id}/reprocess",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video ID")),
    responses(
        (status = 202, description = "Video reset and queued for processing", body = ProcessingAccepted),
        (status = 403, description = "Caller did not create the class", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 409, description = "Video is being processed by a live run", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn reprocess_video(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(video_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ProcessingAccepted>), HttpAppError> {
    let video = creator_video(
        &state,
        video_id,
        user.user_id,
        "Only class creators can reprocess videos",
    )
    .await?;

    let current = video.processing_status;
    let next = if current == ProcessingStatus::Processing && is_stale(&state, &video) {
        tracing::warn!(
            video_id = %video.id,
            updated_at = %video.updated_at,
            "Resetting video stuck in processing"
        );
        current
            .transition(StatusEvent::Fail)?
            .transition(StatusEvent::Reset)?
    } else {
        current.transition(StatusEvent::Reset)?
    };
    let applied = state
        .videos
        .apply_pipeline_update(video.id, current, PipelineUpdate::reset(next))
        .await?;
    if !applied {
        return Err(AppError::Conflict(
            "Video status changed while resetting; reload and retry".to_string(),
        )
        .into());
    }

    submit_processing(&state, video.id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessingAccepted::new("Video queued for reprocessing", video.id)),
    ))
}
