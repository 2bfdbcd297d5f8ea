//! Speech-to-text over HTTP (Whisper-style inference endpoint).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 300;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one mp3 audio chunk.
    async fn transcribe(&self, audio: Bytes) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Posts the audio as multipart field `audio` (`audio.mp3`) with bearer auth and
/// reads `text` from the JSON reply.
#[derive(Clone)]
pub struct WhisperClient {
    http_client: reqwest::Client,
    url: String,
    api_key: String,
}

impl WhisperClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to create HTTP client for speech-to-text, using default client");
                reqwest::Client::default()
            });

        Self {
            http_client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    async fn request(&self, audio: Bytes) -> Result<String> {
        let part = Part::bytes(audio.to_vec())
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .context("Invalid audio MIME type")?;
        let form = Form::new().part("audio", part);

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("status {}: {}", status, error_text));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(parsed.text)
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    #[tracing::instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(&self, audio: Bytes) -> Result<String> {
        let start = std::time::Instant::now();
        match self.request(audio).await {
            Ok(text) => {
                tracing::debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "Audio chunk transcribed"
                );
                Ok(text)
            }
            Err(e) => {
                tracing::error!(error = %e, "Speech-to-text request failed");
                Err(anyhow!("Transcription failed: {}", e))
            }
        }
    }
}
