//! Offline summarizer
//!
//! Builds a digest without calling a model: one entry per message, user text
//! clipped, agent replies collapsed to a marker. Used when no model is
//! configured and as the default for save-time compaction.

use async_trait::async_trait;
use tracing::debug;

use super::{ServiceError, Summarizer};
use crate::domain::{Message, Role};

/// Deterministic extractive summarizer
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    /// Entries kept from the newest end of the input
    pub max_entries: usize,
    /// Characters kept from each user message
    pub max_message_chars: usize,
    /// Upper bound on the whole digest, prior summary included
    pub max_summary_chars: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_message_chars: 100,
            max_summary_chars: 2000,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Keep the newest `max_chars` characters
fn keep_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let skip = total - max_chars;
    format!("...{}", text.chars().skip(skip).collect::<String>())
}

impl ExtractiveSummarizer {
    pub fn digest(&self, messages: &[Message], prior_summary: Option<&str>) -> String {
        let start = messages.len().saturating_sub(self.max_entries);
        let entries: Vec<String> = messages[start..]
            .iter()
            .map(|m| match m.role {
                Role::User => format!("User: {}", clip(m.content.trim(), self.max_message_chars)),
                Role::Agent => "Agent: [responded]".to_string(),
            })
            .collect();

        let body = entries.join(" | ");
        let combined = match prior_summary.filter(|p| !p.is_empty()) {
            Some(prior) if body.is_empty() => prior.to_string(),
            Some(prior) => format!("{} | {}", prior, body),
            None => body,
        };
        keep_tail(&combined, self.max_summary_chars)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, messages: &[Message], prior_summary: Option<&str>) -> Result<String, ServiceError> {
        debug!(message_count = messages.len(), "ExtractiveSummarizer::summarize: called");
        Ok(self.digest(messages, prior_summary))
    }
}
