//! Lectio Processing Library
//!
//! Turns an uploaded lecture video into a transcript and a chronological topic summary,
//! and generates quizzes from that summary.
//!
//! - [`audio`]: download and transcode to mp3, slice into chunks (ffmpeg / ffprobe)
//! - [`chunking`]: audio chunk planning and transcript word chunking
//! - [`stitching`]: merging per-chunk topic lists into one summary
//! - [`orchestration`]: the pipeline run that drives a video's `processing_status`
//! - [`quiz`]: request validation and the quiz run that drives `mcq_generation_status`

pub mod audio;
pub mod chunking;
pub mod orchestration;
pub mod quiz;
pub mod stitching;

pub use audio::{AudioExtractor, ExtractedAudio, FfmpegAudioExtractor};
pub use chunking::{
    chunk_text, join_transcripts, plan_audio_chunks, AudioChunk, AUDIO_CHUNK_MAX_MINUTES,
    TEXT_CHUNK_MAX_WORDS,
};
pub use orchestration::{
    PipelineConfig, PipelineError, PipelineOrchestrator, PipelineOutcome, PipelineStage,
};
pub use quiz::{QuizError, QuizOrchestrator, QuizRequest, ValidQuizRequest};
pub use stitching::{CarryForwardStitcher, TopicStitcher};
