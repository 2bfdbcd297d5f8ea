//! Transcript summarization into chronological topics.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use lectio_core::models::SummaryItem;

use crate::chat::{ChatClient, ChatMessage};
use crate::fences::{outer_json_object, strip_code_fences};

const SUMMARY_MAX_TOKENS: u32 = 4000;

static TOPICS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<T>(.*?)</T>").expect("valid topics regex"));
static ANSWERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<A>(.*?)</A>").expect("valid answers regex"));
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(\d+)>(.*?)</(\d+)>").expect("valid numbered regex"));

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize one transcript chunk into ordered topics.
    ///
    /// `carried` is the last topic of the previous chunk, withheld from the result so
    /// the model can either continue it or start fresh.
    async fn summarize(&self, text: &str, carried: Option<&SummaryItem>)
        -> Result<Vec<SummaryItem>>;
}

pub struct LlmSummarizer {
    chat: ChatClient,
}

impl LlmSummarizer {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

pub(crate) fn build_summary_prompt(text: &str, carried: Option<&SummaryItem>) -> String {
    let mut prompt = String::from(
        "[Strictly adhere to the formatting rules] Your reply should be in JSON format where \
         each key is a topic and the value of the key is the topic's summary. ALL TOPICS \
         SHOULD HAVE A CORRESPONDING SUMMARY. The summary should be a brief of what is inside \
         the text (phrase it like: The instructor says that...). The topics should be \
         chronological according to the lecture script I am providing. Don't create useless \
         topics, they should be relevant. Descriptive 100 words of summary for each topic.",
    );

    if let Some(previous) = carried {
        prompt.push_str(&format!(
            "\n\nThe previous part of this lecture ended with the topic \"{}\": {}\n\
             If the text below continues that topic, make it your first topic, keep its title \
             and write a summary covering both parts. Otherwise start fresh with new topics.",
            previous.title, previous.content
        ));
    }

    prompt.push_str(&format!("\n\nText: \"{}\"", text));
    prompt
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    #[tracing::instrument(skip(self, text, carried), fields(chars = text.len(), carried = carried.is_some()))]
    async fn summarize(
        &self,
        text: &str,
        carried: Option<&SummaryItem>,
    ) -> Result<Vec<SummaryItem>> {
        let prompt = build_summary_prompt(text, carried);
        let reply = self
            .chat
            .complete(&[ChatMessage::user(prompt)], None, Some(SUMMARY_MAX_TOKENS))
            .await
            .map_err(|e| anyhow!("Summary generation failed: {}", e))?;

        let items = parse_summary(&reply)?;
        tracing::debug!(topics = items.len(), "Transcript chunk summarized");
        Ok(items)
    }
}

/// Parse a model reply into summary items.
///
/// Accepts a JSON object `{"topic": "summary", ...}` (key order preserved, optionally
/// fenced or surrounded by prose) or the tagged form
/// `<T><1>title</1>...</T><A><1>summary</1>...</A>`. Titles and contents are trimmed;
/// an empty title or content, or an empty result, is an error.
pub fn parse_summary(raw: &str) -> Result<Vec<SummaryItem>> {
    let cleaned = strip_code_fences(raw);

    let pairs = if TOPICS_RE.is_match(&cleaned) {
        parse_tagged(&cleaned)?
    } else {
        parse_json_object(&cleaned)?
    };

    let mut items = Vec::with_capacity(pairs.len());
    for (index, (title, content)) in pairs.into_iter().enumerate() {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() || content.is_empty() {
            bail!(
                "Failed to parse structured summary: invalid summary item at index {}: missing title or content",
                index
            );
        }
        items.push(SummaryItem::new(title, content));
    }

    if items.is_empty() {
        bail!("Failed to parse structured summary: no topics and summaries could be extracted");
    }

    Ok(items)
}

fn parse_json_object(text: &str) -> Result<Vec<(String, String)>> {
    let object: Map<String, Value> = serde_json::from_str(text)
        .or_else(|first_err| {
            outer_json_object(text)
                .ok_or(first_err)
                .and_then(|candidate| serde_json::from_str(candidate))
        })
        .map_err(|e| anyhow!("Failed to parse structured summary: {}", e))?;

    object
        .into_iter()
        .enumerate()
        .map(|(index, (title, value))| match value {
            Value::String(content) => Ok((title, content)),
            _ => Err(anyhow!(
                "Failed to parse structured summary: invalid summary item at index {}: content must be a string",
                index
            )),
        })
        .collect()
}

fn numbered_entries(block: &str) -> Vec<(u32, String)> {
    NUMBERED_RE
        .captures_iter(block)
        .filter(|c| c[1] == c[3])
        .filter_map(|c| Some((c[1].parse().ok()?, c[2].trim().to_string())))
        .collect()
}

fn parse_tagged(text: &str) -> Result<Vec<(String, String)>> {
    let topics = TOPICS_RE
        .captures(text)
        .map(|c| numbered_entries(&c[1]))
        .ok_or_else(|| anyhow!("Failed to parse structured summary: invalid summary format"))?;
    let answers = ANSWERS_RE
        .captures(text)
        .map(|c| numbered_entries(&c[1]))
        .ok_or_else(|| anyhow!("Failed to parse structured summary: invalid summary format"))?;

    // Topics without a matching summary are dropped.
    Ok(topics
        .into_iter()
        .filter_map(|(index, title)| {
            answers
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, content)| (title, content.clone()))
        })
        .collect())
}
