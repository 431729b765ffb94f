//! Token-equivalent size metric
//!
//! Approximation: bytes / 4, rounded up, plus a fixed per-message overhead.
//! Not tied to any vendor tokenizer; only needs to be monotonic and
//! deterministic.

use crate::domain::{ConversationState, Message};

/// Fixed cost of one message (role marker, separators)
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Estimate token count for text content
pub fn estimate_text_tokens(text: &str) -> u32 {
    (text.len() as u32).div_ceil(4)
}

/// Estimate tokens for a single message
pub fn estimate_message_tokens(msg: &Message) -> u32 {
    MESSAGE_OVERHEAD_TOKENS + estimate_text_tokens(&msg.content)
}

/// Estimate tokens for a summary; an absent summary costs nothing
pub fn estimate_summary_tokens(summary: Option<&str>) -> u32 {
    summary.map_or(0, |s| MESSAGE_OVERHEAD_TOKENS + estimate_text_tokens(s))
}

/// Estimate tokens for a run of messages
pub fn estimate_messages_tokens(messages: &[Message]) -> u32 {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Size of summary plus retained tail
pub fn conversation_tokens(conv: &ConversationState) -> u32 {
    estimate_summary_tokens(conv.summary()) + estimate_messages_tokens(conv.messages())
}
