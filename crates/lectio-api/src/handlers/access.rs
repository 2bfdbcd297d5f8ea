//! Lookups shared by handlers that enforce class membership or ownership.

use lectio_core::models::{Class, Video};
use lectio_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::state::AppState;

pub(crate) async fn find_class(state: &AppState, class_id: Uuid) -> Result<Class, HttpAppError> {
    state
        .classes
        .get_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()).into())
}

pub(crate) async fn find_video(state: &AppState, video_id: Uuid) -> Result<Video, HttpAppError> {
    state
        .videos
        .get_video(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()).into())
}

/// A class the caller belongs to.
pub(crate) async fn member_class(
    state: &AppState,
    class_id: Uuid,
    user_id: Uuid,
) -> Result<Class, HttpAppError> {
    let class = find_class(state, class_id).await?;
    if !class.is_member(user_id) {
        return Err(AppError::Forbidden("You are not a member of this class".to_string()).into());
    }
    Ok(class)
}

/// A video whose class the caller belongs to.
pub(crate) async fn member_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
) -> Result<Video, HttpAppError> {
    let video = find_video(state, video_id).await?;
    let allowed = state
        .classes
        .get_class(video.class_id)
        .await?
        .is_some_and(|class| class.is_member(user_id));
    if !allowed {
        return Err(
            AppError::Forbidden("You are not a member of this video's class".to_string()).into(),
        );
    }
    Ok(video)
}

/// A video whose class was created by the caller. `denied` is the 403 message.
pub(crate) async fn creator_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
    denied: &str,
) -> Result<Video, HttpAppError> {
    let video = find_video(state, video_id).await?;
    let allowed = state
        .classes
        .get_class(video.class_id)
        .await?
        .is_some_and(|class| class.is_creator(user_id));
    if !allowed {
        return Err(AppError::Forbidden(denied.to_string()).into());
    }
    Ok(video)
}
