//! Video API tests: upload, listing, search, deletion, reprocessing and the
//! processing task run end to end over stub services.
//!
//! Run with: `cargo test -p lectio-api --test videos_test`

mod helpers;

use chrono::Utc;
use helpers::auth::{test_user, token_for};
use helpers::fixtures::{class_with_members, summarized_video, upload_form};
use helpers::stubs::SlowSpeech;
use helpers::{
    api_path, setup_test_app, setup_test_app_with_speech, MAX_VIDEO_BYTES, TEST_JWT_SECRET,
};
use lectio_core::models::{Task, TaskStatus, TaskType};
use lectio_core::{ProcessingStatus, TaskError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use lectio_db::test_helpers::video_fixture;
use lectio_worker::TaskHandlerContext;
use serde_json::{json, Value};
use uuid::Uuid;

fn process_task(video_id: Uuid, retry_count: i32, max_retries: i32, timeout_seconds: i32) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        task_type: TaskType::ProcessVideo,
        status: TaskStatus::Running,
        payload: json!({ "video_id": video_id }),
        result: None,
        scheduled_at: now,
        started_at: Some(now),
        completed_at: None,
        retry_count,
        max_retries,
        timeout_seconds: Some(timeout_seconds),
        created_at: now,
        updated_at: now,
    }
}

fn is_recoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TaskError>()
        .map(TaskError::is_recoverable)
        .unwrap_or(true)
}

#[tokio::test]
async fn test_upload_video_queues_processing() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);

    let response = client
        .post(&api_path("/videos/upload"))
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(
            &class.id.to_string(),
            "lecture.MP4",
            "video/mp4",
            vec![7u8; 2048],
        ))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["message"], "Video upload successful");
    assert_eq!(body["status"], "processing");
    let video_id: Uuid = body["videoId"].as_str().unwrap().parse().unwrap();

    let video = app.videos.video(video_id).expect("video stored");
    assert_eq!(video.processing_status, ProcessingStatus::Pending);
    assert_eq!(video.title, "Lecture 1");
    assert!(video.media_url.ends_with(&video.asset_id));
    assert!(app.media_dir.path().join(&video.asset_id).exists());

    let submitted = app.tasks.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, TaskType::ProcessVideo);
    assert_eq!(submitted[0].1["video_id"], video_id.to_string());

    // The stored file is served back under /media.
    let media = client.get(&format!("/media/{}", video.asset_id)).await;
    assert_eq!(media.status_code(), 200);
    assert_eq!(media.as_bytes().len(), 2048);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let student = test_user();
    let class = class_with_members(&app, &lecturer, &[&student]);
    let class_id = class.id.to_string();
    let path = api_path("/videos/upload");

    let not_creator = client
        .post(&path)
        .authorization_bearer(&student.token)
        .multipart(upload_form(&class_id, "a.mp4", "video/mp4", vec![0u8; 16]))
        .await;
    assert_eq!(not_creator.status_code(), 403);

    let unknown_class = client
        .post(&path)
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(
            &Uuid::new_v4().to_string(),
            "a.mp4",
            "video/mp4",
            vec![0u8; 16],
        ))
        .await;
    assert_eq!(unknown_class.status_code(), 404);

    let bad_type = client
        .post(&path)
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(&class_id, "slides.pdf", "application/pdf", vec![0u8; 16]))
        .await;
    assert_eq!(bad_type.status_code(), 400);

    let too_large = client
        .post(&path)
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(
            &class_id,
            "a.mp4",
            "video/mp4",
            vec![0u8; MAX_VIDEO_BYTES + 1],
        ))
        .await;
    assert_eq!(too_large.status_code(), 413);

    let bad_class_id = client
        .post(&path)
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form("not-a-uuid", "a.mp4", "video/mp4", vec![0u8; 16]))
        .await;
    assert_eq!(bad_class_id.status_code(), 400);

    assert!(app.tasks.submitted().is_empty());
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = test_user();

    let missing = client.get(&api_path("/classes")).await;
    assert_eq!(missing.status_code(), 401);

    let expired = client
        .get(&api_path("/classes"))
        .authorization_bearer(token_for(user.user_id, -60, TEST_JWT_SECRET))
        .await;
    assert_eq!(expired.status_code(), 401);
    assert_eq!(expired.json::<Value>()["error"], "Token has expired");

    let wrong_secret = client
        .get(&api_path("/classes"))
        .authorization_bearer(token_for(
            user.user_id,
            3600,
            "another-secret-that-is-also-long-enough",
        ))
        .await;
    assert_eq!(wrong_secret.status_code(), 401);

    let health = client.get("/health").await;
    assert_eq!(health.status_code(), 200);
}

#[tokio::test]
async fn test_list_class_videos_hides_processing_error() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let student = test_user();
    let outsider = test_user();
    let class = class_with_members(&app, &lecturer, &[&student]);

    let mut failed = video_fixture(class.id, lecturer.user_id, "Broken Lecture");
    failed.processing_status = ProcessingStatus::Failed;
    failed.processing_error = Some("Transcription failed: status 503".to_string());
    app.videos.insert(failed.clone());
    summarized_video(&app, &class, "Consensus Lecture");

    let path = api_path(&format!("/videos/class/{}", class.id));
    let response = client.get(&path).authorization_bearer(&student.token).await;
    assert_eq!(response.status_code(), 200);
    let videos: Vec<Value> = response.json();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0]["title"], "Consensus Lecture");
    assert!(videos.iter().all(|v| v.get("processingError").is_none()));

    // The single-video view keeps the error for the class.
    let detail = client
        .get(&api_path(&format!("/videos/{}", failed.id)))
        .authorization_bearer(&student.token)
        .await;
    assert_eq!(detail.status_code(), 200);
    assert_eq!(
        detail.json::<Value>()["processingError"],
        "Transcription failed: status 503"
    );

    let forbidden = client.get(&path).authorization_bearer(&outsider.token).await;
    assert_eq!(forbidden.status_code(), 403);
}

#[tokio::test]
async fn test_search_splits_title_and_topic_matches() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);

    let by_title = summarized_video(&app, &class, "Quorum Systems");
    let by_topic = summarized_video(&app, &class, "Replication");
    app.videos
        .insert(video_fixture(class.id, lecturer.user_id, "Unrelated"));

    let response = client
        .get(&api_path("/videos/search"))
        .add_query_param("query", "quorum")
        .add_query_param("classId", class.id.to_string())
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let ids = |key: &str| -> Vec<String> {
        body[key]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids("titleMatches"), vec![by_title.id.to_string()]);
    let topic_ids = ids("topicMatches");
    assert!(topic_ids.contains(&by_topic.id.to_string()));
    assert!(!topic_ids.contains(&by_title.id.to_string()));

    let missing = client
        .get(&api_path("/videos/search"))
        .add_query_param("query", "quorum")
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(missing.status_code(), 400);
}

#[tokio::test]
async fn test_delete_video() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let student = test_user();
    let class = class_with_members(&app, &lecturer, &[&student]);
    let video = summarized_video(&app, &class, "Lecture");
    let path = api_path(&format!("/videos/{}", video.id));

    let forbidden = client.delete(&path).authorization_bearer(&student.token).await;
    assert_eq!(forbidden.status_code(), 403);

    let response = client.delete(&path).authorization_bearer(&lecturer.token).await;
    assert_eq!(response.status_code(), 200);
    assert!(app.videos.video(video.id).is_none());

    let missing = client.delete(&path).authorization_bearer(&lecturer.token).await;
    assert_eq!(missing.status_code(), 404);
}

#[tokio::test]
async fn test_reprocess_resets_and_requeues() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);

    let mut failed = video_fixture(class.id, lecturer.user_id, "Lecture");
    failed.processing_status = ProcessingStatus::Failed;
    failed.processing_error = Some("Summarization failed: status 500".to_string());
    app.videos.insert(failed.clone());

    let response = client
        .post(&api_path(&format!("/videos/{}/reprocess", failed.id)))
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(response.status_code(), 202);

    let video = app.videos.video(failed.id).unwrap();
    assert_eq!(video.processing_status, ProcessingStatus::Pending);
    assert!(video.processing_error.is_none());
    assert_eq!(app.tasks.submitted().len(), 1);

    let mut running = video_fixture(class.id, lecturer.user_id, "Running");
    running.processing_status = ProcessingStatus::Processing;
    app.videos.insert(running.clone());

    let conflict = client
        .post(&api_path(&format!("/videos/{}/reprocess", running.id)))
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(conflict.status_code(), 409);
    assert_eq!(app.tasks.submitted().len(), 1);
}

#[tokio::test]
async fn test_processing_task_completes_video() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);

    let upload = client
        .post(&api_path("/videos/upload"))
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(
            &class.id.to_string(),
            "lecture.mp4",
            "video/mp4",
            vec![1u8; 512],
        ))
        .await;
    assert_eq!(upload.status_code(), 201);

    let (task_type, payload) = app.tasks.submitted().remove(0);
    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4(),
        task_type,
        status: TaskStatus::Running,
        payload,
        result: None,
        scheduled_at: now,
        started_at: Some(now),
        completed_at: None,
        retry_count: 0,
        max_retries: 0,
        timeout_seconds: Some(60),
        created_at: now,
        updated_at: now,
    };

    let result = app
        .state
        .clone()
        .dispatch_task(&task)
        .await
        .expect("pipeline task succeeds");
    assert_eq!(result["status"], "completed");

    let video_id: Uuid = upload.json::<Value>()["videoId"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let video = app.videos.video(video_id).unwrap();
    assert_eq!(video.processing_status, ProcessingStatus::Completed);
    let transcript = video.transcription.expect("transcription stored");
    assert!(transcript.contains("chunk-0") && transcript.contains("chunk-3"));
    assert!(!video.summary.is_empty());

    assert_eq!(video.duration_seconds, Some(720.0));
    let thumbnail_url = video.thumbnail_url.clone().expect("thumbnail stored");
    assert!(thumbnail_url.starts_with("http://localhost/media/video-thumbnails/"));
    let thumbnail_path = app
        .media_dir
        .path()
        .join(video.thumbnail_asset_id.as_deref().expect("thumbnail asset id"));
    assert!(thumbnail_path.exists());

    let fetched = client
        .get(&api_path(&format!("/videos/{}", video_id)))
        .authorization_bearer(&lecturer.token)
        .await
        .json::<Value>();
    assert_eq!(fetched["durationSeconds"], 720.0);
    assert_eq!(fetched["thumbnailUrl"], thumbnail_url);

    // A second delivery of the same task is a no-op.
    let again = app.state.clone().dispatch_task(&task).await.unwrap();
    assert_eq!(again["status"], "skipped");

    let deleted = client
        .delete(&api_path(&format!("/videos/{}", video_id)))
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(deleted.status_code(), 200);
    assert!(!thumbnail_path.exists());
}

#[tokio::test]
async fn test_upload_is_kept_when_queueing_fails() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);
    app.tasks.fail.store(true, Ordering::SeqCst);

    let response = client
        .post(&api_path("/videos/upload"))
        .authorization_bearer(&lecturer.token)
        .multipart(upload_form(
            &class.id.to_string(),
            "lecture.mp4",
            "video/mp4",
            vec![1u8; 512],
        ))
        .await;
    assert_eq!(response.status_code(), 201);
    assert!(app.tasks.submitted().is_empty());

    let video_id: Uuid = response.json::<Value>()["videoId"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let video = app.videos.video(video_id).expect("video kept");
    assert_eq!(video.processing_status, ProcessingStatus::Pending);

    // Reprocessing a pending video queues it once the queue is back.
    app.tasks.fail.store(false, Ordering::SeqCst);
    let retried = client
        .post(&api_path(&format!("/videos/{}/reprocess", video_id)))
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(retried.status_code(), 202);
    assert_eq!(app.tasks.submitted().len(), 1);
}

#[tokio::test]
async fn test_timed_out_processing_marks_video_failed() {
    let app = setup_test_app_with_speech(Arc::new(SlowSpeech {
        delay: Duration::from_secs(30),
    }))
    .await;
    let video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Long lecture");
    app.videos.insert(video.clone());

    let err = app
        .state
        .clone()
        .dispatch_task(&process_task(video.id, 0, 3, 1))
        .await
        .expect_err("run exceeds its deadline");
    assert!(!is_recoverable(&err));

    let stored = app.videos.video(video.id).unwrap();
    assert_eq!(stored.processing_status, ProcessingStatus::Failed);
    assert!(stored
        .processing_error
        .as_deref()
        .unwrap()
        .contains("1 second task timeout"));
    assert!(stored.transcription.is_none());
}

#[tokio::test]
async fn test_store_failure_on_last_attempt_marks_video_failed() {
    let app = setup_test_app().await;
    let mut video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Lecture");
    video.processing_status = ProcessingStatus::Processing;
    app.videos.insert(video.clone());

    // With attempts left the video stays processing for the retry to resume.
    app.videos.fail_next_writes(1);
    let err = app
        .state
        .clone()
        .dispatch_task(&process_task(video.id, 0, 1, 60))
        .await
        .expect_err("store write fails");
    assert!(is_recoverable(&err));
    assert_eq!(
        app.videos.video(video.id).unwrap().processing_status,
        ProcessingStatus::Processing
    );

    app.videos.fail_next_writes(1);
    let err = app
        .state
        .clone()
        .dispatch_task(&process_task(video.id, 1, 1, 60))
        .await
        .expect_err("store write fails");
    assert!(err.to_string().contains("temporarily unavailable"));

    let stored = app.videos.video(video.id).unwrap();
    assert_eq!(stored.processing_status, ProcessingStatus::Failed);
    assert!(stored
        .processing_error
        .as_deref()
        .unwrap()
        .starts_with("Processing failed: Content store error"));
}

#[tokio::test]
async fn test_reprocess_recovers_stale_processing_video() {
    let app = setup_test_app().await;
    let client = app.client();
    let lecturer = test_user();
    let class = class_with_members(&app, &lecturer, &[]);

    let mut stuck = video_fixture(class.id, lecturer.user_id, "Stuck");
    stuck.processing_status = ProcessingStatus::Processing;
    stuck.transcription = Some("partial".to_string());
    stuck.updated_at = Utc::now() - chrono::Duration::hours(2);
    app.videos.insert(stuck.clone());

    let response = client
        .post(&api_path(&format!("/videos/{}/reprocess", stuck.id)))
        .authorization_bearer(&lecturer.token)
        .await;
    assert_eq!(response.status_code(), 202);

    let video = app.videos.video(stuck.id).unwrap();
    assert_eq!(video.processing_status, ProcessingStatus::Pending);
    assert!(video.transcription.is_none());
    assert_eq!(app.tasks.submitted().len(), 1);
}
