//! Budget-driven conversation compression

use std::time::Duration;

use tracing::{debug, info, warn};

use super::tokens::{MESSAGE_OVERHEAD_TOKENS, conversation_tokens, estimate_messages_tokens};
use crate::config::ContextConfig;
use crate::domain::ConversationState;
use crate::llm::{ServiceError, Summarizer, with_timeout};

/// Result of one compression pass
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// Size was within the threshold
    NotNeeded,
    /// Older messages were folded into the summary
    Compressed {
        summarized: usize,
        tokens_before: u32,
        tokens_after: u32,
    },
    /// Summarizer failed or timed out; the conversation is untouched
    Skipped(ServiceError),
    /// The retained tail alone is over the threshold
    ///
    /// Anything older was still folded (`summarized` messages) with its
    /// summary kept whole; `tokens` is the size afterwards.
    OverBudget { summarized: usize, tokens: u32 },
}

impl CompressionOutcome {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }
}

/// Token budget and retention policy for the live conversation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextWindow {
    budget: u32,
    threshold: u32,
    retain: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

impl ContextWindow {
    /// `ratio` is the fraction of `budget` at which compression kicks in
    pub fn new(budget: u32, ratio: f64, retain: usize) -> Self {
        let threshold = (f64::from(budget) * ratio).round() as u32;
        Self {
            budget,
            threshold: threshold.min(budget),
            retain,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.budget_tokens, config.compression_threshold, config.retain_messages)
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    /// Whether the conversation is over the compression threshold
    pub fn needs_compression(&self, conv: &ConversationState) -> bool {
        conversation_tokens(conv) > self.threshold
    }

    /// Fold everything older than the retained tail into the summary when over threshold
    ///
    /// The summarizer sees the older messages and the prior summary; its reply
    /// replaces the summary outright. A reply too large for the room left next
    /// to the tail loses its oldest text. When the tail leaves no room at all,
    /// the older messages are folded anyway and the outcome is `OverBudget`.
    pub async fn compress(
        &self,
        conv: &mut ConversationState,
        summarizer: &dyn Summarizer,
        timeout: Duration,
    ) -> CompressionOutcome {
        let tokens_before = conversation_tokens(conv);
        debug!(tokens_before, threshold = self.threshold, retained = conv.len(), "compress: called");

        if tokens_before <= self.threshold {
            return CompressionOutcome::NotNeeded;
        }

        let older = conv.older_than_tail(self.retain);
        if older.is_empty() {
            warn!(tokens = tokens_before, "Retained tail alone exceeds the context threshold");
            return CompressionOutcome::OverBudget {
                summarized: 0,
                tokens: tokens_before,
            };
        }

        let summary = match with_timeout(timeout, summarizer.summarize(older, conv.summary())).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summarizer failed, skipping compression for this turn");
                return CompressionOutcome::Skipped(e);
            }
        };

        let tail_start = conv.len() - self.retain;
        let tail_tokens = estimate_messages_tokens(&conv.messages()[tail_start..]);
        let room = self
            .threshold
            .saturating_sub(tail_tokens)
            .saturating_sub(MESSAGE_OVERHEAD_TOKENS);

        if room == 0 {
            let summarized = conv.fold_into_summary(self.retain, summary);
            let tokens = conversation_tokens(conv);
            warn!(summarized, tokens, "Retained tail alone exceeds the context threshold");
            return CompressionOutcome::OverBudget { summarized, tokens };
        }

        let summary = keep_last_bytes(summary, room as usize * 4);
        let summarized = conv.fold_into_summary(self.retain, summary);
        let tokens_after = conversation_tokens(conv);
        info!(summarized, tokens_before, tokens_after, "Compressed conversation");

        CompressionOutcome::Compressed {
            summarized,
            tokens_before,
            tokens_after,
        }
    }
}

/// Keep at most the last `max_bytes` of `text`, moving forward to a char boundary
///
/// Summaries put the newest context last, so the front is what gets dropped.
fn keep_last_bytes(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    debug!(from = text.len(), to = text.len() - start, "keep_last_bytes: summary cut to fit");
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use crate::llm::ExtractiveSummarizer;
    use crate::llm::client::mock::MockSummarizer;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn long_conversation(n: usize, size: usize) -> ConversationState {
        let mut conv = ConversationState::new();
        for i in 0..n {
            let text = format!("{:03} {}", i, "x".repeat(size));
            if i % 2 == 0 {
                conv.push(Message::user(text));
            } else {
                conv.push(Message::agent(text));
            }
        }
        conv
    }

    #[test]
    fn test_default_thresholds() {
        let window = ContextWindow::default();
        assert_eq!(window.budget(), 8000);
        assert_eq!(window.threshold(), 5600);
        assert_eq!(window.retain(), 4);
    }

    #[tokio::test]
    async fn test_under_threshold_is_not_needed() {
        let window = ContextWindow::default();
        let mut conv = long_conversation(10, 10);
        let before = conv.clone();
        let summarizer = MockSummarizer::fixed("never used");

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert_eq!(outcome, CompressionOutcome::NotNeeded);
        assert_eq!(conv, before);
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_compress_keeps_last_four_in_order() {
        let window = ContextWindow::default();
        let mut conv = long_conversation(30, 1000);
        let expected_tail: Vec<_> = conv.messages()[26..].to_vec();
        let summarizer = MockSummarizer::fixed("digest of older talk");

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(outcome.is_compressed());
        assert_eq!(conv.messages(), expected_tail.as_slice());
        assert_eq!(conv.summary(), Some("digest of older talk"));
        assert_eq!(conv.summarized_count(), 26);
        assert!(conversation_tokens(&conv) <= window.threshold());
        assert_eq!(summarizer.inputs(), vec![(26, None)]);
    }

    #[tokio::test]
    async fn test_prior_summary_is_passed_and_replaced() {
        let window = ContextWindow::new(200, 0.5, 2);
        let mut conv = long_conversation(6, 100);
        conv.fold_into_summary(0, "first digest".to_string());
        for i in 0..6 {
            conv.push(Message::user(format!("{} {}", i, "y".repeat(100))));
        }
        let summarizer = MockSummarizer::fixed("second digest");

        window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert_eq!(summarizer.inputs(), vec![(4, Some("first digest".to_string()))]);
        assert_eq!(conv.summary(), Some("second digest"));
        assert_eq!(conv.summarized_count(), 10);
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let window = ContextWindow::default();
        let mut conv = long_conversation(30, 1000);
        let summarizer = ExtractiveSummarizer::default();

        window.compress(&mut conv, &summarizer, TIMEOUT).await;
        let after_first = conv.clone();
        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert_eq!(outcome, CompressionOutcome::NotNeeded);
        assert_eq!(conv, after_first);
    }

    #[tokio::test]
    async fn test_summarizer_failure_leaves_state_untouched() {
        let window = ContextWindow::default();
        let mut conv = long_conversation(30, 1000);
        let before = conv.clone();
        let summarizer = MockSummarizer::failing();

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(matches!(outcome, CompressionOutcome::Skipped(ServiceError::Unavailable(_))));
        assert_eq!(conv, before);
    }

    #[tokio::test]
    async fn test_summarizer_timeout_is_skipped() {
        let window = ContextWindow::default();
        let mut conv = long_conversation(30, 1000);
        let summarizer = MockSummarizer::fixed("late").with_delay(Duration::from_secs(10));
        let limit = Duration::from_millis(20);

        let outcome = window.compress(&mut conv, &summarizer, limit).await;

        assert_eq!(outcome, CompressionOutcome::Skipped(ServiceError::Timeout(limit)));
        assert_eq!(conv.len(), 30);
    }

    #[tokio::test]
    async fn test_oversized_summary_is_truncated_to_fit() {
        let window = ContextWindow::new(400, 0.5, 2);
        let mut conv = long_conversation(10, 100);
        let summarizer = MockSummarizer::fixed(&"é".repeat(1000));

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(outcome.is_compressed());
        assert!(conversation_tokens(&conv) <= window.threshold());
        assert!(conv.summary().is_some_and(|s| s.chars().all(|c| c == 'é')));
    }

    #[tokio::test]
    async fn test_tail_alone_over_budget() {
        let window = ContextWindow::new(100, 0.7, 4);
        let mut conv = long_conversation(3, 200);
        let summarizer = MockSummarizer::fixed("unused");

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(matches!(outcome, CompressionOutcome::OverBudget { .. }));
        assert_eq!(conv.len(), 3);
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_large_tail_folds_older_and_keeps_summary() {
        let window = ContextWindow::new(400, 0.5, 2);
        let mut conv = ConversationState::new();
        conv.push(Message::user("Plan a trip"));
        conv.push(Message::agent("Where to?"));
        conv.push(Message::user("a".repeat(1000)));
        conv.push(Message::agent("b".repeat(1000)));
        let summarizer = MockSummarizer::fixed("Lisbon in May");

        let outcome = window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(matches!(outcome, CompressionOutcome::OverBudget { summarized: 2, .. }));
        assert_eq!(conv.summary(), Some("Lisbon in May"));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.summarized_count(), 2);
    }

    #[tokio::test]
    async fn test_truncated_summary_keeps_newest_text() {
        let window = ContextWindow::new(400, 0.5, 2);
        let mut conv = long_conversation(10, 100);
        let digest = format!("{} newest", "old ".repeat(300));
        let summarizer = MockSummarizer::fixed(&digest);

        window.compress(&mut conv, &summarizer, TIMEOUT).await;

        assert!(conv.summary().is_some_and(|s| s.ends_with("newest")));
        assert!(conversation_tokens(&conv) <= window.threshold());
    }

    #[test]
    fn test_keep_last_bytes_respects_char_boundary() {
        assert_eq!(keep_last_bytes("hellé".to_string(), 2), "é");
        assert_eq!(keep_last_bytes("hellé".to_string(), 3), "lé");
        assert_eq!(keep_last_bytes("abc".to_string(), 10), "abc");
    }
}
