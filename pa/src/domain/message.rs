//! Conversation domain types
//!
//! Messages are immutable once appended. The conversation keeps a retained
//! tail of verbatim messages plus an optional summary standing in for every
//! message that was dropped from the front of the tail.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::now_ms;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl Message {
    /// Create a user message stamped now
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            timestamp: now_ms(),
        }
    }

    /// Create an agent message stamped now
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: text.into(),
            timestamp: now_ms(),
        }
    }
}

/// Ordered conversation with an optional summary of older turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Retained tail, in append order
    messages: Vec<Message>,
    /// Digest of every message older than the tail
    summary: Option<String>,
    /// Number of messages the summary stands in for
    summarized_count: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Retained messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn summarized_count(&self) -> u64 {
        self.summarized_count
    }

    /// Retained tail length
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.summary.is_none()
    }

    /// Every message the session has seen, summarized ones included
    pub fn total_message_count(&self) -> u64 {
        self.summarized_count + self.messages.len() as u64
    }

    /// Messages that would be folded into the summary if only `keep` were retained
    pub fn older_than_tail(&self, keep: usize) -> &[Message] {
        let split = self.messages.len().saturating_sub(keep);
        &self.messages[..split]
    }

    /// Replace everything older than the last `keep` messages with `summary`
    ///
    /// The new summary fully replaces the old one: it must cover the previous
    /// summary as well as the dropped messages. Returns how many messages were
    /// dropped from the tail.
    ///
    /// A blank summary never erases history: the prior summary is kept and,
    /// when messages were dropped, a marker noting how many is added.
    pub fn fold_into_summary(&mut self, keep: usize, summary: String) -> usize {
        let split = self.messages.len().saturating_sub(keep);
        debug!(keep, split, "fold_into_summary: called");
        self.messages.drain(..split);
        self.summarized_count += split as u64;
        if !summary.trim().is_empty() {
            self.summary = Some(summary);
        } else if split > 0 {
            warn!(split, "fold_into_summary: blank summary, recording a marker");
            self.summary = Some(match self.summary.take() {
                Some(prior) => format!("{}\n[{} further messages not summarized]", prior, split),
                None => format!("[{} earlier messages not summarized]", split),
            });
        }
        split
    }
}
