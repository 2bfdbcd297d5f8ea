use axum_test::multipart::{MultipartForm, Part};
use lectio_core::models::{Class, SummaryItem, Video};
use lectio_db::test_helpers::video_fixture;
use lectio_core::ProcessingStatus;
use uuid::Uuid;

use super::auth::TestUser;
use super::TestApp;

/// A class created by `creator` with the given extra members.
pub fn class_with_members(app: &TestApp, creator: &TestUser, members: &[&TestUser]) -> Class {
    let mut member_ids = vec![creator.user_id];
    member_ids.extend(members.iter().map(|m| m.user_id));
    let class = Class {
        id: Uuid::new_v4(),
        title: "Distributed Systems".to_string(),
        code: "ABCD1234".to_string(),
        creator_id: creator.user_id,
        members: member_ids,
        created_at: chrono::Utc::now(),
    };
    app.classes.insert(class.clone());
    class
}

/// A completed video with a three-topic summary.
pub fn summarized_video(app: &TestApp, class: &Class, title: &str) -> Video {
    let mut video = video_fixture(class.id, class.creator_id, title);
    video.processing_status = ProcessingStatus::Completed;
    video.transcription = Some("consensus needs a quorum of replicas".to_string());
    video.summary = vec![
        SummaryItem::new("Consensus", "The instructor says that consensus..."),
        SummaryItem::new("Quorums", "The instructor says that quorums..."),
        SummaryItem::new("Leader Election", "The instructor says that leaders..."),
    ];
    app.videos.insert(video.clone());
    video
}

pub fn upload_form(class_id: &str, filename: &str, content_type: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", "Lecture 1")
        .add_text("description", "Introduction")
        .add_text("classId", class_id.to_string())
        .add_part(
            "video",
            Part::bytes(bytes)
                .file_name(filename.to_string())
                .mime_type(content_type.to_string()),
        )
}
