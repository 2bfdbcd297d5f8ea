//! OpenAPI documentation.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use crate::setup::routes::health;
use lectio_core::models;
use lectio_core::ProcessingStatus;
use lectio_processing::QuizRequest;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectio API",
        version = "0.1.0",
        description = "Lecture video platform: classes, video uploads, automatic transcription and topic summaries, notes and quiz generation. All endpoints except /health are versioned under /api/v1/ and require a bearer JWT."
    ),
    modifiers(&BearerAuth),
    paths(
        health::health_check,
        // Videos
        handlers::videos::upload_video,
        handlers::videos::list_class_videos,
        handlers::videos::search_videos,
        handlers::videos::get_video,
        handlers::videos::delete_video,
        handlers::videos::reprocess_video,
        // Notes
        handlers::notes::add_note,
        handlers::notes::list_notes,
        // Summary
        handlers::summary::update_summary,
        handlers::summary::delete_summary_topic,
        // Quiz
        handlers::quiz::generate_quiz,
        // Classes
        handlers::classes::create_class,
        handlers::classes::join_class,
        handlers::classes::list_classes,
        handlers::classes::leave_class,
        handlers::classes::delete_class,
    ),
    components(
        schemas(
            models::Video,
            models::SummaryItem,
            models::SummaryItemInput,
            models::Mcq,
            models::VideoSearchResults,
            models::Class,
            models::CreateClassRequest,
            models::JoinClassRequest,
            models::Note,
            models::CreateNoteRequest,
            ProcessingStatus,
            QuizRequest,
            handlers::MessageResponse,
            handlers::videos::ProcessingAccepted,
            handlers::summary::UpdateSummaryRequest,
            handlers::summary::SummaryResponse,
            handlers::quiz::QuizResponse,
            handlers::classes::ClassResponse,
            handlers::classes::ClassListResponse,
            health::HealthCheckResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "videos", description = "Lecture video upload, listing, search and processing"),
        (name = "notes", description = "Private per-user notes on a video"),
        (name = "summary", description = "Manual editing of generated topic summaries"),
        (name = "quiz", description = "Multiple-choice quiz generation from a summary"),
        (name = "classes", description = "Classes, join codes and membership"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_versioned_paths_and_bearer_scheme() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/v1/videos/upload"));
        assert!(spec.paths.paths.contains_key("/api/v1/classes/{class_id}/leave"));
        assert!(spec.paths.paths.contains_key("/health"));

        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
