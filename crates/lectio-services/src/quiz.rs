//! Multiple-choice quiz generation from a lecture summary.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use lectio_core::models::{Mcq, SummaryItem, MCQ_OPTION_COUNT};

use crate::chat::{ChatClient, ChatMessage};
use crate::fences::{outer_json_object, strip_code_fences};

const QUIZ_TEMPERATURE: f32 = 0.7;

const QUIZ_SYSTEM_PROMPT: &str = "You are a quiz generation AI. You must respond with ONLY a valid JSON object containing MCQs without any markdown formatting or code blocks. Do not include any explanatory text or code block markers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn guidelines(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Focus on basic concept recognition and simple recall from individual topics. Questions should be straightforward.",
            Difficulty::Medium => "Include application of concepts and some analysis. Questions may require connecting information from related topics.",
            Difficulty::Hard => "Focus on complex analysis, evaluation, and synthesis across multiple topics. Include challenging scenarios that require deep understanding.",
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive.
impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(anyhow!("Invalid difficulty: {}", other)),
        }
    }
}

#[async_trait]
pub trait QuizService: Send + Sync {
    /// Generate exactly `count` questions from the full summary.
    async fn generate_mcqs(
        &self,
        summary: &[SummaryItem],
        count: usize,
        difficulty: Difficulty,
        instructions: &str,
    ) -> Result<Vec<Mcq>>;
}

pub struct LlmQuizService {
    chat: ChatClient,
}

impl LlmQuizService {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

pub(crate) fn build_quiz_prompt(
    summary: &[SummaryItem],
    count: usize,
    difficulty: Difficulty,
    instructions: &str,
) -> String {
    let topics = summary
        .iter()
        .map(|item| format!("Topic: {}\nContent: {}", item.title, item.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Based on these lecture topics and their content:

{topics}

Generate a multiple choice quiz with these exact requirements:
1. Exactly {count} questions
2. Difficulty level: {difficulty}
3. {instructions}
Most questions should be about the subjects the lecture explains rather than about what happened in the video; use your own knowledge of those subjects.

IMPORTANT: You must respond with ONLY a valid JSON object in this exact format:
{{
  "mcqs": [
    {{
      "question": "question text here",
      "options": ["option1", "option2", "option3", "option4"],
      "correctAnswerIndex": 0,
      "explanation": "explanation here"
    }}
  ]
}}

Rules:
- Format must be exactly as shown above
- No markdown, no code blocks, just the raw JSON
- Each question must have exactly 4 options
- correctAnswerIndex must be 0-3
- All JSON must be valid
- Questions should match {difficulty} difficulty:
  {guidelines}"#,
        guidelines = difficulty.guidelines(),
    )
}

#[async_trait]
impl QuizService for LlmQuizService {
    #[tracing::instrument(skip(self, summary, instructions), fields(topics = summary.len()))]
    async fn generate_mcqs(
        &self,
        summary: &[SummaryItem],
        count: usize,
        difficulty: Difficulty,
        instructions: &str,
    ) -> Result<Vec<Mcq>> {
        let messages = [
            ChatMessage::system(QUIZ_SYSTEM_PROMPT),
            ChatMessage::user(build_quiz_prompt(summary, count, difficulty, instructions)),
        ];
        let reply = self
            .chat
            .complete(&messages, Some(QUIZ_TEMPERATURE), None)
            .await?;

        let mcqs = parse_mcqs(&reply, count)?;
        tracing::debug!(questions = mcqs.len(), "Quiz generated");
        Ok(mcqs)
    }
}

fn required_text(item: &Value, field: &str, index: usize) -> Result<String> {
    let text = item
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        bail!("Invalid question format at index {}: missing {}", index, field);
    }
    Ok(text.to_string())
}

fn parse_mcq(item: &Value, index: usize) -> Result<Mcq> {
    let question = required_text(item, "question", index)?;
    let explanation = required_text(item, "explanation", index)?;

    let options = item
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid question format at index {}: missing options", index))?;
    if options.len() != MCQ_OPTION_COUNT {
        bail!(
            "Question at index {} must have exactly {} options",
            index,
            MCQ_OPTION_COUNT
        );
    }
    let options = options
        .iter()
        .map(|o| {
            o.as_str()
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Invalid option at question {}", index))
        })
        .collect::<Result<Vec<_>>>()?;

    let correct_answer_index = item
        .get("correctAnswerIndex")
        .and_then(Value::as_u64)
        .filter(|i| (*i as usize) < MCQ_OPTION_COUNT)
        .ok_or_else(|| anyhow!("Invalid correctAnswerIndex at question {}", index))?;

    Ok(Mcq {
        question,
        options,
        correct_answer_index: correct_answer_index as u8,
        explanation,
    })
}

/// Parse and validate a model reply `{"mcqs": [...]}`.
///
/// The whole result is rejected if any question is malformed, the list is empty, or it
/// does not contain exactly `expected_count` questions.
pub fn parse_mcqs(raw: &str, expected_count: usize) -> Result<Vec<Mcq>> {
    let cleaned = strip_code_fences(raw);
    let parsed: Value = serde_json::from_str(&cleaned)
        .or_else(|first_err| {
            outer_json_object(&cleaned)
                .ok_or(first_err)
                .and_then(|candidate| serde_json::from_str(candidate))
        })
        .map_err(|e| anyhow!("Failed to parse MCQs: {}", e))?;

    let items = parsed
        .get("mcqs")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid quiz format: mcqs array is missing"))?;

    let mcqs = items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_mcq(item, index))
        .collect::<Result<Vec<_>>>()?;

    if mcqs.is_empty() {
        bail!("No MCQs could be extracted");
    }
    if mcqs.len() != expected_count {
        bail!(
            "Expected {} questions but received {}",
            expected_count,
            mcqs.len()
        );
    }

    Ok(mcqs)
}
