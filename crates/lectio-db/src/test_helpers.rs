//! In-memory store implementations for testing without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use lectio_core::models::{
    format_class_code, Class, MediaDetails, NewVideo, Note, PipelineUpdate, QuizUpdate,
    SummaryItem, Video,
};
use lectio_core::ProcessingStatus;

use crate::db::traits::{ClassStore, VideoStore};

/// A pending video with placeholder media fields.
pub fn video_fixture(class_id: Uuid, creator_id: Uuid, title: &str) -> Video {
    let now = Utc::now();
    Video {
        id: Uuid::new_v4(),
        class_id,
        creator_id,
        title: title.to_string(),
        description: format!("{} description", title),
        media_url: "http://localhost:8080/media/course-videos/lecture.mp4".to_string(),
        asset_id: "course-videos/lecture.mp4".to_string(),
        thumbnail_url: None,
        thumbnail_asset_id: None,
        duration_seconds: None,
        transcription: None,
        summary: Vec::new(),
        mcqs: Vec::new(),
        processing_status: ProcessingStatus::Pending,
        processing_error: None,
        mcq_generation_status: ProcessingStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

fn newest_first(mut videos: Vec<(usize, Video)>) -> Vec<Video> {
    videos.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
    videos.into_iter().map(|(_, v)| v).collect()
}

/// In-memory [`VideoStore`]. Set [`fail_writes`](Self::fail_writes) to simulate an
/// unavailable database on every mutating call, or
/// [`fail_next_writes`](Self::fail_next_writes) for a transient outage.
#[derive(Clone, Default)]
pub struct InMemoryVideoStore {
    videos: Arc<Mutex<HashMap<Uuid, (usize, Video)>>>,
    notes: Arc<Mutex<Vec<Note>>>,
    next_seq: Arc<Mutex<usize>>,
    fail_writes: Arc<AtomicBool>,
    failing_writes: Arc<AtomicUsize>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video: Video) {
        let seq = {
            let mut next = self.next_seq.lock().unwrap();
            *next += 1;
            *next
        };
        self.videos.lock().unwrap().insert(video.id, (seq, video));
    }

    pub fn video(&self, id: Uuid) -> Option<Video> {
        self.videos.lock().unwrap().get(&id).map(|(_, v)| v.clone())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` mutating calls, then recover.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("in-memory store unavailable");
        }
        if self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("in-memory store temporarily unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn create_video(&self, new_video: NewVideo) -> Result<Video> {
        self.check_writable()?;
        let mut video = video_fixture(new_video.class_id, new_video.creator_id, &new_video.title);
        video.description = new_video.description;
        video.media_url = new_video.media_url;
        video.asset_id = new_video.asset_id;
        video.duration_seconds = new_video.duration_seconds;
        self.insert(video.clone());
        Ok(video)
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        Ok(self.video(id))
    }

    async fn list_class_videos(&self, class_id: Uuid) -> Result<Vec<Video>> {
        let videos = self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|(_, v)| v.class_id == class_id)
            .cloned()
            .collect();
        Ok(newest_first(videos))
    }

    async fn delete_video(&self, id: Uuid) -> Result<bool> {
        self.check_writable()?;
        let removed = self.videos.lock().unwrap().remove(&id).is_some();
        if removed {
            self.notes.lock().unwrap().retain(|n| n.video_id != id);
        }
        Ok(removed)
    }

    async fn save_transcription(&self, id: Uuid, transcription: &str) -> Result<()> {
        self.check_writable()?;
        if let Some((_, video)) = self.videos.lock().unwrap().get_mut(&id) {
            video.transcription = Some(transcription.to_string());
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn save_media_details(&self, id: Uuid, details: MediaDetails) -> Result<()> {
        self.check_writable()?;
        if let Some((_, video)) = self.videos.lock().unwrap().get_mut(&id) {
            video.duration_seconds = Some(details.duration_seconds);
            if let Some(thumbnail) = details.thumbnail {
                video.thumbnail_url = Some(thumbnail.url);
                video.thumbnail_asset_id = Some(thumbnail.asset_id);
            }
            video.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_pipeline_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: PipelineUpdate,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut videos = self.videos.lock().unwrap();
        let Some((_, video)) = videos.get_mut(&id) else {
            return Ok(false);
        };
        if video.processing_status != expected {
            return Ok(false);
        }
        video.processing_status = update.status;
        video.processing_error = update.error;
        if update.clear_outputs {
            video.transcription = None;
            video.summary = Vec::new();
        } else if let Some(summary) = update.summary {
            video.summary = summary;
        }
        video.updated_at = Utc::now();
        Ok(true)
    }

    async fn apply_quiz_update(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        update: QuizUpdate,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut videos = self.videos.lock().unwrap();
        let Some((_, video)) = videos.get_mut(&id) else {
            return Ok(false);
        };
        if video.mcq_generation_status != expected {
            return Ok(false);
        }
        video.mcq_generation_status = update.status;
        if let Some(mcqs) = update.mcqs {
            video.mcqs = mcqs;
        }
        video.updated_at = Utc::now();
        Ok(true)
    }

    async fn replace_summary(
        &self,
        id: Uuid,
        summary: Vec<SummaryItem>,
    ) -> Result<Option<Vec<SummaryItem>>> {
        self.check_writable()?;
        let mut videos = self.videos.lock().unwrap();
        Ok(videos.get_mut(&id).map(|(_, video)| {
            video.summary = summary;
            video.updated_at = Utc::now();
            video.summary.clone()
        }))
    }

    async fn search_class_videos(&self, class_id: Uuid, query: &str) -> Result<Vec<Video>> {
        let needle = query.to_lowercase();
        let videos = self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|(_, v)| v.class_id == class_id)
            .filter(|(_, v)| {
                v.title.to_lowercase().contains(&needle)
                    || v
                        .summary
                        .iter()
                        .any(|item| item.title.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(newest_first(videos))
    }

    async fn add_note(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        heading: &str,
        content: &str,
    ) -> Result<Note> {
        self.check_writable()?;
        let note = Note {
            id: Uuid::new_v4(),
            video_id,
            user_id,
            heading: heading.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.notes.lock().unwrap().push(note.clone());
        Ok(note)
    }

    async fn list_notes(&self, video_id: Uuid, user_id: Uuid) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.video_id == video_id && n.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`ClassStore`].
#[derive(Clone, Default)]
pub struct InMemoryClassStore {
    classes: Arc<Mutex<Vec<Class>>>,
}

impl InMemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, class: Class) {
        self.classes.lock().unwrap().push(class);
    }
}

#[async_trait]
impl ClassStore for InMemoryClassStore {
    async fn create_class(&self, title: &str, creator_id: Uuid) -> Result<Class> {
        let mut classes = self.classes.lock().unwrap();
        let code = loop {
            let code = format_class_code(rand::random::<[u8; 4]>());
            if !classes.iter().any(|c| c.code == code) {
                break code;
            }
        };
        let class = Class {
            id: Uuid::new_v4(),
            title: title.to_string(),
            code,
            creator_id,
            members: vec![creator_id],
            created_at: Utc::now(),
        };
        classes.push(class.clone());
        Ok(class)
    }

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>> {
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Class>> {
        let code = code.to_uppercase();
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn add_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()> {
        if let Some(class) = self
            .classes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == class_id)
        {
            if !class.members.contains(&user_id) {
                class.members.push(user_id);
            }
        }
        Ok(())
    }

    async fn remove_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()> {
        if let Some(class) = self
            .classes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == class_id)
        {
            class.members.retain(|m| *m != user_id);
        }
        Ok(())
    }

    async fn list_user_classes(&self, user_id: Uuid) -> Result<Vec<Class>> {
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|c| c.members.contains(&user_id))
            .cloned()
            .collect())
    }

    async fn delete_class(&self, id: Uuid) -> Result<bool> {
        let mut classes = self.classes.lock().unwrap();
        let before = classes.len();
        classes.retain(|c| c.id != id);
        Ok(classes.len() < before)
    }
}
