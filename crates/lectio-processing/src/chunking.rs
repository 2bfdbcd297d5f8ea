//! Chunk planning for audio and transcript text.
//!
//! Speech-to-text and LLM endpoints both reject oversized inputs, so long lectures are
//! processed in bounded pieces and reassembled in order.

/// Longest audio slice sent to speech-to-text in one request.
pub const AUDIO_CHUNK_MAX_MINUTES: f64 = 3.5;

/// Most words sent to the summarizer in one request.
pub const TEXT_CHUNK_MAX_WORDS: usize = 2000;

/// A half-open time range `[start_minutes, end_minutes)` of the source audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioChunk {
    pub index: usize,
    pub start_minutes: f64,
    pub end_minutes: f64,
}

impl AudioChunk {
    pub fn start_seconds(&self) -> f64 {
        self.start_minutes * 60.0
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end_minutes - self.start_minutes) * 60.0
    }
}

/// Split `total_minutes` of audio into `ceil(total / AUDIO_CHUNK_MAX_MINUTES)` consecutive
/// ranges covering `[0, total)` exactly once. The last range may be shorter.
///
/// A zero, negative or non-finite duration yields no chunks.
pub fn plan_audio_chunks(total_minutes: f64) -> Vec<AudioChunk> {
    if !total_minutes.is_finite() || total_minutes <= 0.0 {
        return Vec::new();
    }

    let count = (total_minutes / AUDIO_CHUNK_MAX_MINUTES).ceil() as usize;
    (0..count)
        .map(|index| AudioChunk {
            index,
            start_minutes: index as f64 * AUDIO_CHUNK_MAX_MINUTES,
            end_minutes: ((index + 1) as f64 * AUDIO_CHUNK_MAX_MINUTES).min(total_minutes),
        })
        .collect()
}

/// Split text on whitespace into ordered segments of at most [`TEXT_CHUNK_MAX_WORDS`]
/// words each, joined by single spaces.
pub fn chunk_text(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(TEXT_CHUNK_MAX_WORDS)
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Join per-chunk transcripts with single spaces, collapsing any whitespace runs.
pub fn join_transcripts<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .flat_map(|part| part.as_ref().split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
