//! Lecture pipeline orchestration: extract audio → transcribe in chunks → summarize in
//! chunks with topic stitching → one atomic write of the summary.
//!
//! The run owns `processing_status`. Every status it writes is computed with
//! [`ProcessingStatus::transition`] and stored with a compare-and-set against the status
//! it expects, so a concurrent reset is never overwritten.

use anyhow::Context;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use lectio_core::models::{MediaDetails, PipelineUpdate, StoredThumbnail, SummaryItem, Video};
use lectio_core::{ProcessingStatus, StatusEvent, TransitionError};
use lectio_db::VideoStore;
use lectio_services::{SpeechToText, Summarizer};
use lectio_storage::{MediaKind, MediaStore};

use crate::audio::{AudioExtractor, ExtractedAudio};
use crate::chunking::{chunk_text, join_transcripts, plan_audio_chunks};
use crate::stitching::TopicStitcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    AudioExtraction,
    Transcription,
    Summarization,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            PipelineStage::AudioExtraction => "Audio extraction",
            PipelineStage::Transcription => "Transcription",
            PipelineStage::Summarization => "Summarization",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Video not found: {0}")]
    NotFound(Uuid),

    /// A stage failed; `message` is what was recorded as the video's processing error.
    #[error("{message}")]
    Stage {
        stage: PipelineStage,
        message: String,
    },

    #[error("Content store error: {0:#}")]
    Store(#[source] anyhow::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    fn stage(stage: PipelineStage, err: anyhow::Error) -> Self {
        let prefix = format!("{} failed", stage);
        let detail = format!("{:#}", err);
        let message = if detail.starts_with(&prefix) {
            detail
        } else {
            format!("{}: {}", prefix, detail)
        };
        PipelineError::Stage { stage, message }
    }

    /// Store errors leave the video in `processing`; running the pipeline again resumes
    /// it. Everything else is final for this run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Store(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed { topics: usize },
    /// The video was already terminal; nothing was done.
    Skipped { status: ProcessingStatus },
    /// Another writer changed the status while this run held it; results were dropped.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause between consecutive speech-to-text requests.
    pub chunk_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_secs(1),
        }
    }
}

pub struct PipelineOrchestrator {
    videos: Arc<dyn VideoStore>,
    audio: Arc<dyn AudioExtractor>,
    speech: Arc<dyn SpeechToText>,
    summarizer: Arc<dyn Summarizer>,
    stitcher: Arc<dyn TopicStitcher>,
    thumbnails: Option<Arc<dyn MediaStore>>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        audio: Arc<dyn AudioExtractor>,
        speech: Arc<dyn SpeechToText>,
        summarizer: Arc<dyn Summarizer>,
        stitcher: Arc<dyn TopicStitcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            videos,
            audio,
            speech,
            summarizer,
            stitcher,
            thumbnails: None,
            config,
        }
    }

    /// Store a thumbnail frame for videos that do not have one yet.
    pub fn with_thumbnails(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.thumbnails = Some(store);
        self
    }

    /// Run the full pipeline for one video.
    ///
    /// On a stage failure the video is marked `failed` with the stage message before the
    /// error is returned. No partial summary is ever written.
    #[tracing::instrument(skip_all, fields(video_id = %video_id))]
    pub async fn run_pipeline(&self, video_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or(PipelineError::NotFound(video_id))?;

        let current = video.processing_status;
        if current.is_terminal() {
            tracing::info!(status = %current, "Video already processed, skipping pipeline run");
            return Ok(PipelineOutcome::Skipped { status: current });
        }

        let processing = current.transition(StatusEvent::Begin)?;
        if current == processing {
            tracing::info!("Resuming interrupted pipeline run");
        } else if !self
            .videos
            .apply_pipeline_update(video_id, current, PipelineUpdate::status(processing))
            .await
            .map_err(PipelineError::Store)?
        {
            tracing::warn!("Video status changed before the run started");
            return Ok(PipelineOutcome::Superseded);
        }

        tracing::info!("Starting lecture pipeline");
        let start = std::time::Instant::now();

        match self.run_stages(&video).await {
            Ok(summary) => {
                let topics = summary.len();
                let completed = processing.transition(StatusEvent::Succeed)?;
                let applied = self
                    .videos
                    .apply_pipeline_update(
                        video_id,
                        processing,
                        PipelineUpdate::completed(completed, summary),
                    )
                    .await
                    .map_err(PipelineError::Store)?;

                if !applied {
                    tracing::warn!("Video status changed during the run, discarding summary");
                    return Ok(PipelineOutcome::Superseded);
                }

                tracing::info!(
                    topics,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Lecture pipeline completed"
                );
                Ok(PipelineOutcome::Completed { topics })
            }
            Err(PipelineError::Stage { stage, message }) => {
                tracing::error!(stage = %stage, error = %message, "Lecture pipeline failed");

                let failed = processing.transition(StatusEvent::Fail)?;
                let applied = self
                    .videos
                    .apply_pipeline_update(
                        video_id,
                        processing,
                        PipelineUpdate::failed(failed, message.clone()),
                    )
                    .await
                    .map_err(PipelineError::Store)?;
                if !applied {
                    tracing::warn!("Video status changed during the run, failure not recorded");
                }

                Err(PipelineError::Stage { stage, message })
            }
            Err(other) => Err(other),
        }
    }

    /// Mark a run that ended outside [`run_pipeline`](Self::run_pipeline)'s control
    /// (deadline hit, retries exhausted) as failed with `reason`.
    ///
    /// Only a video still in `processing` is touched. Returns whether it was marked.
    #[tracing::instrument(skip(self, video_id), fields(video_id = %video_id))]
    pub async fn abandon_run(&self, video_id: Uuid, reason: &str) -> Result<bool, PipelineError> {
        let Some(video) = self
            .videos
            .get_video(video_id)
            .await
            .map_err(PipelineError::Store)?
        else {
            return Ok(false);
        };

        let current = video.processing_status;
        if current != ProcessingStatus::Processing {
            tracing::debug!(status = %current, "Video is not processing, nothing to abandon");
            return Ok(false);
        }

        let failed = current.transition(StatusEvent::Fail)?;
        let applied = self
            .videos
            .apply_pipeline_update(video_id, current, PipelineUpdate::failed(failed, reason))
            .await
            .map_err(PipelineError::Store)?;
        if applied {
            tracing::warn!(reason, "Abandoned pipeline run marked as failed");
        }
        Ok(applied)
    }

    async fn run_stages(&self, video: &Video) -> Result<Vec<SummaryItem>, PipelineError> {
        let audio = self
            .audio
            .extract(&video.media_url)
            .await
            .map_err(|e| PipelineError::stage(PipelineStage::AudioExtraction, e))?;

        let transcribed = match self.record_media(video, audio.as_ref()).await {
            Ok(()) => self.transcribe(audio.as_ref()).await,
            Err(e) => Err(e),
        };
        audio.close().await;
        let transcript = transcribed?;

        self.videos
            .save_transcription(video.id, &transcript)
            .await
            .context("Failed to save transcription")
            .map_err(PipelineError::Store)?;

        self.summarize(&transcript).await
    }

    /// Persist the measured duration, plus a thumbnail if the video has none. A thumbnail
    /// that cannot be stored is skipped; it never fails the run.
    async fn record_media(
        &self,
        video: &Video,
        audio: &dyn ExtractedAudio,
    ) -> Result<(), PipelineError> {
        let thumbnail = match (&self.thumbnails, &video.thumbnail_url) {
            (Some(store), None) => match audio.thumbnail() {
                Some(frame) => match store
                    .upload(frame, "thumbnail.jpg", "image/jpeg", MediaKind::Thumbnail)
                    .await
                {
                    Ok(asset) => Some(StoredThumbnail {
                        url: asset.url,
                        asset_id: asset.asset_id,
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to store thumbnail");
                        None
                    }
                },
                None => None,
            },
            _ => None,
        };

        let details = MediaDetails {
            duration_seconds: audio.duration_minutes() * 60.0,
            thumbnail: thumbnail.clone(),
        };
        if let Err(e) = self.videos.save_media_details(video.id, details).await {
            if let (Some(store), Some(thumbnail)) = (&self.thumbnails, thumbnail) {
                if let Err(cleanup) = store.delete(&thumbnail.asset_id).await {
                    tracing::warn!(error = %cleanup, asset_id = %thumbnail.asset_id, "Failed to remove unrecorded thumbnail");
                }
            }
            return Err(PipelineError::Store(e.context("Failed to save media details")));
        }

        Ok(())
    }

    async fn transcribe(&self, audio: &dyn ExtractedAudio) -> Result<String, PipelineError> {
        let chunks = plan_audio_chunks(audio.duration_minutes());
        tracing::info!(
            chunks = chunks.len(),
            duration_minutes = audio.duration_minutes(),
            "Transcribing audio"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            if chunk.index > 0 && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }

            let data = audio
                .read_chunk(chunk)
                .await
                .map_err(|e| PipelineError::stage(PipelineStage::AudioExtraction, e))?;
            let text = self
                .speech
                .transcribe(data)
                .await
                .map_err(|e| PipelineError::stage(PipelineStage::Transcription, e))?;

            tracing::debug!(
                chunk = chunk.index,
                start_minutes = chunk.start_minutes,
                end_minutes = chunk.end_minutes,
                chars = text.len(),
                "Audio chunk transcribed"
            );
            parts.push(text);
        }

        let transcript = join_transcripts(&parts);
        if transcript.is_empty() {
            return Err(PipelineError::stage(
                PipelineStage::Transcription,
                anyhow::anyhow!("no speech was recognized"),
            ));
        }

        Ok(transcript)
    }

    async fn summarize(&self, transcript: &str) -> Result<Vec<SummaryItem>, PipelineError> {
        let chunks = chunk_text(transcript);
        tracing::info!(chunks = chunks.len(), "Summarizing transcript");

        let mut merged = Vec::new();
        let mut carried: Option<SummaryItem> = None;
        for (index, chunk) in chunks.iter().enumerate() {
            let topics = self
                .summarizer
                .summarize(chunk, carried.as_ref())
                .await
                .map_err(|e| PipelineError::stage(PipelineStage::Summarization, e))?;

            tracing::debug!(chunk = index, topics = topics.len(), "Transcript chunk summarized");
            carried = self
                .stitcher
                .stitch(&mut merged, topics, index + 1 == chunks.len());
        }

        if merged.is_empty() {
            return Err(PipelineError::stage(
                PipelineStage::Summarization,
                anyhow::anyhow!("no topics were produced"),
            ));
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use lectio_db::test_helpers::{video_fixture, InMemoryVideoStore};
    use lectio_storage::{StorageResult, StoredAsset};

    use crate::chunking::AudioChunk;
    use crate::stitching::CarryForwardStitcher;

    struct MockAudio {
        minutes: f64,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ExtractedAudio for MockAudio {
        fn duration_minutes(&self) -> f64 {
            self.minutes
        }

        async fn read_chunk(&self, chunk: &AudioChunk) -> Result<Bytes> {
            Ok(Bytes::from(format!("chunk-{}", chunk.index)))
        }

        fn thumbnail(&self) -> Option<Bytes> {
            Some(Bytes::from_static(b"frame"))
        }

        async fn close(self: Box<Self>) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Keeps asset ids of uploads that have not been deleted.
    #[derive(Default)]
    struct MockMediaStore {
        assets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaStore for MockMediaStore {
        async fn upload(
            &self,
            _data: Bytes,
            _filename: &str,
            _content_type: &str,
            kind: MediaKind,
        ) -> StorageResult<StoredAsset> {
            let asset_id = format!("{}/{}.jpg", kind.folder(), Uuid::new_v4());
            self.assets.lock().unwrap().push(asset_id.clone());
            Ok(StoredAsset {
                url: format!("http://media.test/{}", asset_id),
                asset_id,
                duration_seconds: None,
            })
        }

        async fn delete(&self, asset_id: &str) -> StorageResult<()> {
            self.assets.lock().unwrap().retain(|a| a != asset_id);
            Ok(())
        }
    }

    struct MockExtractor {
        minutes: f64,
        fail: bool,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AudioExtractor for MockExtractor {
        async fn extract(&self, _media_url: &str) -> Result<Box<dyn ExtractedAudio>> {
            if self.fail {
                return Err(anyhow!("Failed to download video: status 404 Not Found"));
            }
            Ok(Box::new(MockAudio {
                minutes: self.minutes,
                closed: self.closed.clone(),
            }))
        }
    }

    /// Returns `words_per_chunk` words per request, failing on request `fail_at`.
    struct MockSpeech {
        words_per_chunk: usize,
        fail_at: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechToText for MockSpeech {
        async fn transcribe(&self, audio: Bytes) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(audio, Bytes::from(format!("chunk-{}", call)));
            if self.fail_at == Some(call) {
                return Err(anyhow!("Transcription failed: status 503: model loading"));
            }
            Ok((0..self.words_per_chunk)
                .map(|i| format!("c{}w{}", call, i))
                .collect::<Vec<_>>()
                .join(" "))
        }
    }

    /// Returns `topic_counts[n]` topics for the n-th request and records the carried
    /// topic title it was given.
    struct MockSummarizer {
        topic_counts: Vec<usize>,
        fail: bool,
        received: Mutex<Vec<(usize, Option<String>)>>,
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize(
            &self,
            text: &str,
            carried: Option<&SummaryItem>,
        ) -> Result<Vec<SummaryItem>> {
            let call = {
                let mut received = self.received.lock().unwrap();
                received.push((
                    text.split_whitespace().count(),
                    carried.map(|c| c.title.clone()),
                ));
                received.len() - 1
            };
            if self.fail {
                return Err(anyhow!("Summary generation failed: status 500"));
            }
            Ok((0..self.topic_counts[call])
                .map(|i| SummaryItem::new(format!("chunk{}-topic{}", call, i), "The instructor says..."))
                .collect())
        }
    }

    struct Harness {
        store: InMemoryVideoStore,
        speech: Arc<MockSpeech>,
        summarizer: Arc<MockSummarizer>,
        closed: Arc<AtomicBool>,
        orchestrator: PipelineOrchestrator,
    }

    fn harness(
        minutes: f64,
        extract_fails: bool,
        speech: MockSpeech,
        summarizer: MockSummarizer,
    ) -> Harness {
        let store = InMemoryVideoStore::new();
        let closed = Arc::new(AtomicBool::new(false));
        let speech = Arc::new(speech);
        let summarizer = Arc::new(summarizer);
        let orchestrator = PipelineOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(MockExtractor {
                minutes,
                fail: extract_fails,
                closed: closed.clone(),
            }),
            speech.clone(),
            summarizer.clone(),
            Arc::new(CarryForwardStitcher),
            PipelineConfig {
                chunk_delay: Duration::ZERO,
            },
        );
        Harness {
            store,
            speech,
            summarizer,
            closed,
            orchestrator,
        }
    }

    fn speech(words_per_chunk: usize, fail_at: Option<usize>) -> MockSpeech {
        MockSpeech {
            words_per_chunk,
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }

    fn summarizer(topic_counts: Vec<usize>, fail: bool) -> MockSummarizer {
        MockSummarizer {
            topic_counts,
            fail,
            received: Mutex::new(Vec::new()),
        }
    }

    fn pending_video(store: &InMemoryVideoStore) -> Uuid {
        let video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Data Structures");
        let id = video.id;
        store.insert(video);
        id
    }

    #[tokio::test]
    async fn successful_run_stores_ordered_stitched_summary() {
        // 12 minutes -> 4 audio chunks of 1250 words -> 5000 words -> 3 text chunks.
        let h = harness(12.0, false, speech(1250, None), summarizer(vec![3, 2, 4], false));
        let id = pending_video(&h.store);

        let outcome = h.orchestrator.run_pipeline(id).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed { topics: 7 });

        let video = h.store.video(id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Completed);
        assert!(video.processing_error.is_none());
        assert_eq!(
            video.transcription.as_deref().map(|t| t.split_whitespace().count()),
            Some(5000)
        );
        let titles: Vec<&str> = video.summary.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "chunk0-topic0",
                "chunk0-topic1",
                "chunk1-topic0",
                "chunk2-topic0",
                "chunk2-topic1",
                "chunk2-topic2",
                "chunk2-topic3",
            ]
        );
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 4);
        assert!(h.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn last_topic_is_carried_into_next_chunk() {
        let h = harness(12.0, false, speech(1250, None), summarizer(vec![3, 2, 4], false));
        let id = pending_video(&h.store);

        h.orchestrator.run_pipeline(id).await.unwrap();

        let received = h.summarizer.received.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![
                (2000, None),
                (2000, Some("chunk0-topic2".to_string())),
                (1000, Some("chunk1-topic1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn transcription_failure_marks_failed_without_transcript() {
        let h = harness(12.0, false, speech(10, Some(2)), summarizer(vec![1], false));
        let id = pending_video(&h.store);

        let err = h.orchestrator.run_pipeline(id).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: PipelineStage::Transcription,
                ..
            }
        ));
        assert!(!err.is_retryable());

        let video = h.store.video(id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        let message = video.processing_error.unwrap();
        assert!(message.starts_with("Transcription failed"));
        assert!(!message.starts_with("Transcription failed: Transcription failed"));
        assert!(video.transcription.is_none());
        assert!(video.summary.is_empty());
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 3);
        assert!(h.summarizer.received.lock().unwrap().is_empty());
        assert!(h.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn summarization_failure_keeps_transcript_but_no_summary() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], true));
        let id = pending_video(&h.store);

        let err = h.orchestrator.run_pipeline(id).await.unwrap_err();
        assert!(err.to_string().starts_with("Summarization failed"));

        let video = h.store.video(id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert!(video.processing_error.is_some());
        assert!(video.transcription.is_some());
        assert!(video.summary.is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_marks_failed() {
        let h = harness(3.0, true, speech(50, None), summarizer(vec![2], false));
        let id = pending_video(&h.store);

        let err = h.orchestrator.run_pipeline(id).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Audio extraction failed: Failed to download video"));

        let video = h.store.video(id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn silent_audio_fails_transcription() {
        let h = harness(0.0, false, speech(50, None), summarizer(vec![2], false));
        let id = pending_video(&h.store);

        let err = h.orchestrator.run_pipeline(id).await.unwrap_err();
        assert_eq!(err.to_string(), "Transcription failed: no speech was recognized");
        assert_eq!(
            h.store.video(id).unwrap().processing_status,
            ProcessingStatus::Failed
        );
    }

    #[tokio::test]
    async fn missing_video_is_not_found() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let missing = Uuid::new_v4();

        let err = h.orchestrator.run_pipeline(missing).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(id) if id == missing));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn terminal_video_is_skipped() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let mut video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Done");
        video.processing_status = ProcessingStatus::Completed;
        video.summary = vec![SummaryItem::new("Kept", "The instructor says...")];
        let id = video.id;
        h.store.insert(video);

        let outcome = h.orchestrator.run_pipeline(id).await.unwrap();
        assert_eq!(
            outcome,
            PipelineOutcome::Skipped {
                status: ProcessingStatus::Completed
            }
        );
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.video(id).unwrap().summary[0].title, "Kept");
    }

    #[tokio::test]
    async fn interrupted_run_is_resumed() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let mut video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Interrupted");
        video.processing_status = ProcessingStatus::Processing;
        let id = video.id;
        h.store.insert(video);

        let outcome = h.orchestrator.run_pipeline(id).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed { topics: 2 });
        assert_eq!(
            h.store.video(id).unwrap().processing_status,
            ProcessingStatus::Completed
        );
    }

    #[tokio::test]
    async fn store_outage_is_retryable() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let id = pending_video(&h.store);
        h.store.fail_writes(true);

        let err = h.orchestrator.run_pipeline(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
        assert!(err.is_retryable());
        assert_eq!(
            h.store.video(id).unwrap().processing_status,
            ProcessingStatus::Pending
        );
    }

    #[tokio::test]
    async fn run_records_duration_and_thumbnail() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let media = Arc::new(MockMediaStore::default());
        let orchestrator = h.orchestrator.with_thumbnails(media.clone());
        let id = pending_video(&h.store);

        orchestrator.run_pipeline(id).await.unwrap();

        let video = h.store.video(id).unwrap();
        assert_eq!(video.duration_seconds, Some(180.0));
        let asset_id = video.thumbnail_asset_id.expect("thumbnail recorded");
        assert!(asset_id.starts_with("video-thumbnails/"));
        assert_eq!(video.thumbnail_url, Some(format!("http://media.test/{}", asset_id)));
        assert_eq!(*media.assets.lock().unwrap(), vec![asset_id]);
    }

    #[tokio::test]
    async fn existing_thumbnail_is_not_replaced() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let media = Arc::new(MockMediaStore::default());
        let orchestrator = h.orchestrator.with_thumbnails(media.clone());
        let mut video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Has thumbnail");
        video.thumbnail_url = Some("http://media.test/custom.jpg".to_string());
        let id = video.id;
        h.store.insert(video);

        orchestrator.run_pipeline(id).await.unwrap();

        let video = h.store.video(id).unwrap();
        assert_eq!(video.thumbnail_url.as_deref(), Some("http://media.test/custom.jpg"));
        assert_eq!(video.duration_seconds, Some(180.0));
        assert!(media.assets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsaved_media_details_drop_the_thumbnail() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));
        let media = Arc::new(MockMediaStore::default());
        let orchestrator = h.orchestrator.with_thumbnails(media.clone());
        let mut video = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Resumed");
        video.processing_status = ProcessingStatus::Processing;
        let id = video.id;
        h.store.insert(video);
        h.store.fail_next_writes(1);

        let err = orchestrator.run_pipeline(id).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(media.assets.lock().unwrap().is_empty());
        assert!(h.closed.load(Ordering::SeqCst));
        assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);

        let video = h.store.video(id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Processing);
        assert!(video.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn abandon_run_only_fails_processing_videos() {
        let h = harness(3.0, false, speech(50, None), summarizer(vec![2], false));

        let mut stuck = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Stuck");
        stuck.processing_status = ProcessingStatus::Processing;
        let stuck_id = stuck.id;
        h.store.insert(stuck);
        assert!(h
            .orchestrator
            .abandon_run(stuck_id, "Processing did not finish in time")
            .await
            .unwrap());
        let video = h.store.video(stuck_id).unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert_eq!(
            video.processing_error.as_deref(),
            Some("Processing did not finish in time")
        );

        let mut done = video_fixture(Uuid::new_v4(), Uuid::new_v4(), "Done");
        done.processing_status = ProcessingStatus::Completed;
        let done_id = done.id;
        h.store.insert(done);
        assert!(!h.orchestrator.abandon_run(done_id, "late").await.unwrap());
        assert_eq!(
            h.store.video(done_id).unwrap().processing_status,
            ProcessingStatus::Completed
        );

        assert!(!h.orchestrator.abandon_run(Uuid::new_v4(), "gone").await.unwrap());
    }
}
