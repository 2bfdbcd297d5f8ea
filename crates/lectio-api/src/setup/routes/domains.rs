//! Route groups for videos and classes.

use crate::api_path;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn video_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            api_path!("/videos/upload"),
            post(handlers::videos::upload_video),
        )
        .route(
            api_path!("/videos/class/{class_id}"),
            get(handlers::videos::list_class_videos),
        )
        .route(
            api_path!("/videos/search"),
            get(handlers::videos::search_videos),
        )
        .route(
            api_path!("/videos/{video_id}"),
            get(handlers::videos::get_video).delete(handlers::videos::delete_video),
        )
        .route(
            api_path!("/videos/{video_id}/reprocess"),
            post(handlers::videos::reprocess_video),
        )
        .route(
            api_path!("/videos/{video_id}/notes"),
            post(handlers::notes::add_note).get(handlers::notes::list_notes),
        )
        .route(
            api_path!("/videos/{video_id}/summary"),
            put(handlers::summary::update_summary),
        )
        .route(
            api_path!("/videos/{video_id}/summary/{topic_id}"),
            delete(handlers::summary::delete_summary_topic),
        )
        .route(
            api_path!("/videos/{video_id}/generate-quiz"),
            post(handlers::quiz::generate_quiz),
        )
        .with_state(state)
}

pub fn class_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            api_path!("/classes"),
            post(handlers::classes::create_class).get(handlers::classes::list_classes),
        )
        .route(
            api_path!("/classes/join"),
            post(handlers::classes::join_class),
        )
        .route(
            api_path!("/classes/{class_id}/leave"),
            delete(handlers::classes::leave_class),
        )
        .route(
            api_path!("/classes/{class_id}"),
            delete(handlers::classes::delete_class),
        )
        .with_state(state)
}
