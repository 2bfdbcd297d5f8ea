//! Audio extraction with ffmpeg / ffprobe.
//!
//! A lecture is downloaded into a scratch directory, transcoded once to mono mp3 and
//! then sliced chunk by chunk on demand, so at most one chunk file exists at a time.
//! A single frame is grabbed from the download for the video thumbnail before the
//! source file is discarded.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use crate::chunking::AudioChunk;

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const SOURCE_FILE: &str = "source";
const AUDIO_FILE: &str = "audio.mp3";
const CHUNK_FILE: &str = "chunk.mp3";
const THUMBNAIL_FILE: &str = "thumbnail.jpg";
/// Seek offset of the thumbnail frame.
const THUMBNAIL_OFFSET_SECS: &str = "1";

#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Fetch the media at `media_url` and convert it to mp3.
    async fn extract(&self, media_url: &str) -> Result<Box<dyn ExtractedAudio>>;
}

/// Audio track of one lecture, ready to be read in chunks.
#[async_trait]
pub trait ExtractedAudio: Send + Sync {
    fn duration_minutes(&self) -> f64;

    /// A JPEG frame of the source video, when one could be grabbed.
    fn thumbnail(&self) -> Option<Bytes> {
        None
    }

    /// The mp3 bytes of one time range.
    async fn read_chunk(&self, chunk: &AudioChunk) -> Result<Bytes>;

    /// Release scratch files. Failures are logged, not returned.
    async fn close(self: Box<Self>);
}

/// Validate that a path doesn't contain shell metacharacters or dangerous sequences
fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

fn validate_executable(name: &str, path: &str) -> Result<()> {
    validate_path(path).with_context(|| format!("Invalid {} path", name))?;

    if !path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\')
    {
        return Err(anyhow!("Invalid {} path: contains unsafe characters", name));
    }

    Ok(())
}

fn ensure_success(tool: &str, output: Output) -> Result<Output> {
    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(output)
}

/// Read `format.duration` (seconds, as a string) from `ffprobe -print_format json`.
fn parse_probe_duration(stdout: &[u8]) -> Result<f64> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let seconds = json["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("ffprobe reported no duration"))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(anyhow!("ffprobe reported an invalid duration: {}", seconds));
    }

    Ok(seconds)
}

pub struct FfmpegAudioExtractor {
    http_client: reqwest::Client,
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegAudioExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Result<Self> {
        let ffmpeg_path = ffmpeg_path.into();
        let ffprobe_path = ffprobe_path.into();
        validate_executable("ffmpeg", &ffmpeg_path)?;
        validate_executable("ffprobe", &ffprobe_path)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to create HTTP client for media download, using default client");
                reqwest::Client::default()
            });

        Ok(Self {
            http_client,
            ffmpeg_path,
            ffprobe_path,
        })
    }

    #[tracing::instrument(skip(self, target))]
    async fn download(&self, media_url: &str, target: &Path) -> Result<()> {
        let response = self
            .http_client
            .get(media_url)
            .send()
            .await
            .context("Failed to download video")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to download video: status {}",
                response.status()
            ));
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read video body")?;
        tokio::fs::write(target, &body)
            .await
            .context("Failed to write video to scratch directory")?;

        tracing::debug!(bytes = body.len(), "Video downloaded");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "extract_audio"
    ))]
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let start = std::time::Instant::now();

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-b:a", "64k", "-f", "mp3"])
            .arg(output)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;
        ensure_success("ffmpeg", result).context("Audio conversion failed")?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Audio track extracted"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "thumbnail"
    ))]
    async fn grab_frame(&self, input: &Path, output: &Path) -> Result<Bytes> {
        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .args(["-ss", THUMBNAIL_OFFSET_SECS])
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-vf", "scale=640:-2", "-f", "image2"])
            .arg(output)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;
        ensure_success("ffmpeg", result).context("Thumbnail extraction failed")?;

        let data = tokio::fs::read(output)
            .await
            .context("Failed to read thumbnail")?;
        if data.is_empty() {
            return Err(anyhow!("ffmpeg produced an empty thumbnail"));
        }
        Ok(Bytes::from(data))
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe_duration_seconds(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .await
            .context("Failed to execute ffprobe")?;
        let output = ensure_success("ffprobe", output)?;

        parse_probe_duration(&output.stdout)
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, media_url: &str) -> Result<Box<dyn ExtractedAudio>> {
        // Dropping the directory on an early return removes whatever was written.
        let dir = TempDir::new().context("Failed to create scratch directory")?;
        let source = dir.path().join(SOURCE_FILE);
        let audio_path = dir.path().join(AUDIO_FILE);

        self.download(media_url, &source).await?;
        self.transcode(&source, &audio_path).await?;

        let thumbnail = match self
            .grab_frame(&source, &dir.path().join(THUMBNAIL_FILE))
            .await
        {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "No thumbnail frame, continuing without one");
                None
            }
        };

        if let Err(e) = tokio::fs::remove_file(&source).await {
            tracing::warn!(error = %e, "Failed to remove downloaded video after extraction");
        }

        let seconds = self.probe_duration_seconds(&audio_path).await?;
        tracing::info!(duration_seconds = seconds, "Audio ready for transcription");

        Ok(Box::new(FfmpegAudio {
            dir,
            audio_path,
            duration_minutes: seconds / 60.0,
            thumbnail,
            ffmpeg_path: self.ffmpeg_path.clone(),
        }))
    }
}

struct FfmpegAudio {
    dir: TempDir,
    audio_path: PathBuf,
    duration_minutes: f64,
    thumbnail: Option<Bytes>,
    ffmpeg_path: String,
}

#[async_trait]
impl ExtractedAudio for FfmpegAudio {
    fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    fn thumbnail(&self) -> Option<Bytes> {
        self.thumbnail.clone()
    }

    #[tracing::instrument(skip_all, fields(chunk = chunk.index))]
    async fn read_chunk(&self, chunk: &AudioChunk) -> Result<Bytes> {
        let chunk_path = self.dir.path().join(CHUNK_FILE);

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .args(["-ss", &format!("{:.3}", chunk.start_seconds())])
            .args(["-t", &format!("{:.3}", chunk.duration_seconds())])
            .arg("-i")
            .arg(&self.audio_path)
            .args(["-acodec", "copy"])
            .arg(&chunk_path)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;
        ensure_success("ffmpeg", output)
            .with_context(|| format!("Failed to extract audio chunk {}", chunk.index))?;

        let data = tokio::fs::read(&chunk_path)
            .await
            .context("Failed to read audio chunk")?;
        if let Err(e) = tokio::fs::remove_file(&chunk_path).await {
            tracing::warn!(error = %e, chunk = chunk.index, "Failed to remove audio chunk file");
        }

        Ok(Bytes::from(data))
    }

    async fn close(self: Box<Self>) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove scratch directory");
        }
    }
}
