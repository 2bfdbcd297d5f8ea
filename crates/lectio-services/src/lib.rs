//! External service adapters.
//!
//! Each service is a trait with one HTTP-backed implementation:
//! - [`SpeechToText`] / [`WhisperClient`]: audio chunk to text
//! - [`Summarizer`] / [`LlmSummarizer`]: transcript chunk to ordered topics
//! - [`QuizService`] / [`LlmQuizService`]: summary to multiple-choice questions
//!
//! The LLM output parsers ([`parse_summary`], [`parse_mcqs`]) are exposed so they can
//! be tested and reused independently of the HTTP clients.

pub mod chat;
mod fences;
pub mod quiz;
pub mod speech;
pub mod summary;

pub use chat::{ChatClient, ChatMessage};
pub use quiz::{parse_mcqs, Difficulty, LlmQuizService, QuizService};
pub use speech::{SpeechToText, WhisperClient};
pub use summary::{parse_summary, LlmSummarizer, Summarizer};
