use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use lectio_core::models::{Mcq, SummaryItem, TaskType};
use lectio_processing::{AudioChunk, AudioExtractor, ExtractedAudio};
use lectio_services::{Difficulty, QuizService, SpeechToText, Summarizer};
use lectio_worker::TaskSubmitter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Records submitted tasks instead of running them, or rejects them when `fail` is set.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub submitted: Mutex<Vec<(TaskType, serde_json::Value)>>,
    pub fail: AtomicBool,
}

impl RecordingSubmitter {
    pub fn submitted(&self) -> Vec<(TaskType, serde_json::Value)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskSubmitter for RecordingSubmitter {
    async fn submit_task(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        _scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("Failed to create task: connection refused"));
        }
        self.submitted.lock().unwrap().push((task_type, payload));
        Ok(Uuid::new_v4())
    }
}

pub struct StubAudio {
    minutes: f64,
}

#[async_trait]
impl ExtractedAudio for StubAudio {
    fn duration_minutes(&self) -> f64 {
        self.minutes
    }

    async fn read_chunk(&self, chunk: &AudioChunk) -> Result<Bytes> {
        Ok(Bytes::from(format!("chunk-{}", chunk.index)))
    }

    fn thumbnail(&self) -> Option<Bytes> {
        Some(Bytes::from_static(b"\xff\xd8stub-frame"))
    }

    async fn close(self: Box<Self>) {}
}

pub struct StubAudioExtractor {
    pub minutes: f64,
}

#[async_trait]
impl AudioExtractor for StubAudioExtractor {
    async fn extract(&self, _media_url: &str) -> Result<Box<dyn ExtractedAudio>> {
        Ok(Box::new(StubAudio {
            minutes: self.minutes,
        }))
    }
}

/// Echoes the chunk label back as the transcript.
pub struct StubSpeech;

#[async_trait]
impl SpeechToText for StubSpeech {
    async fn transcribe(&self, audio: Bytes) -> Result<String> {
        Ok(format!(
            "words from {}",
            String::from_utf8_lossy(&audio)
        ))
    }
}

/// Never finishes within a short task deadline.
pub struct SlowSpeech {
    pub delay: Duration,
}

#[async_trait]
impl SpeechToText for SlowSpeech {
    async fn transcribe(&self, _audio: Bytes) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("too late".to_string())
    }
}

pub struct StubSummarizer {
    pub topics_per_chunk: usize,
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(
        &self,
        _text: &str,
        _carried: Option<&SummaryItem>,
    ) -> Result<Vec<SummaryItem>> {
        Ok((0..self.topics_per_chunk)
            .map(|i| SummaryItem::new(format!("Topic {}", i), "The instructor says..."))
            .collect())
    }
}

/// Returns `count` well-formed questions, or fails when `fail` is set.
#[derive(Default)]
pub struct StubQuizService {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl QuizService for StubQuizService {
    async fn generate_mcqs(
        &self,
        summary: &[SummaryItem],
        count: usize,
        _difficulty: Difficulty,
        _instructions: &str,
    ) -> Result<Vec<Mcq>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("MCQ generation failed: status 500"));
        }
        Ok((0..count)
            .map(|i| Mcq {
                question: format!("Question {} about {}", i + 1, summary[i % summary.len()].title),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer_index: (i % 4) as u8,
                explanation: "Because the lecture says so.".to_string(),
            })
            .collect())
    }
}
