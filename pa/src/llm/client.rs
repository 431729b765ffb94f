//! Service trait definitions
//!
//! The text-generation and summarization services are external. The core
//! only depends on these contracts and never assumes their output is
//! deterministic.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::ServiceError;
use crate::domain::{Message, Plan, SessionSnapshot};

/// What the text-generation service sees alongside the prompt
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// Digest of older turns
    pub summary: Option<&'a str>,
    /// Retained turns, oldest first (includes the prompt's own message)
    pub messages: &'a [Message],
    /// Current plan, if any
    pub plan: Option<&'a Plan>,
    /// User preference bag
    pub preferences: &'a BTreeMap<String, String>,
}

impl<'a> GenerationContext<'a> {
    pub fn from_snapshot(snapshot: &'a SessionSnapshot) -> Self {
        Self {
            summary: snapshot.conversation.summary(),
            messages: snapshot.conversation.messages(),
            plan: snapshot.plan.as_ref(),
            preferences: &snapshot.preferences,
        }
    }
}

/// Turns a prompt into a natural-language reply
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, context: &GenerationContext<'_>) -> Result<String, ServiceError>;
}

/// Compresses an ordered run of messages into a short digest
///
/// `prior_summary` is the digest the new one must replace; the reply has to
/// stand in for both it and `messages`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message], prior_summary: Option<&str>) -> Result<String, ServiceError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::debug;

    /// Mock text generator for unit tests
    pub struct MockGenerator {
        replies: Vec<Result<String, ServiceError>>,
        call_count: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockGenerator {
        pub fn new(replies: Vec<Result<String, ServiceError>>) -> Self {
            debug!(reply_count = %replies.len(), "MockGenerator::new: called");
            Self {
                replies,
                call_count: AtomicUsize::new(0),
                delay: None,
            }
        }

        /// Acknowledges every prompt, never runs dry
        pub fn echo() -> Self {
            Self::new(Vec::new())
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn generate(&self, prompt: &str, _context: &GenerationContext<'_>) -> Result<String, ServiceError> {
            debug!("MockGenerator::generate: called");
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.replies.is_empty() {
                return Ok(format!("ack: {}", prompt));
            }
            self.replies.get(idx).cloned().unwrap_or_else(|| {
                debug!("MockGenerator::generate: no more mock replies");
                Err(ServiceError::Unavailable("No more mock replies".to_string()))
            })
        }
    }

    /// Mock summarizer for unit tests
    pub struct MockSummarizer {
        reply: Result<String, ServiceError>,
        call_count: AtomicUsize,
        delay: Option<Duration>,
        inputs: Mutex<Vec<(usize, Option<String>)>>,
    }

    impl MockSummarizer {
        pub fn new(reply: Result<String, ServiceError>) -> Self {
            Self {
                reply,
                call_count: AtomicUsize::new(0),
                delay: None,
                inputs: Mutex::new(Vec::new()),
            }
        }

        pub fn fixed(text: &str) -> Self {
            Self::new(Ok(text.to_string()))
        }

        pub fn failing() -> Self {
            Self::new(Err(ServiceError::Unavailable("summarizer offline".to_string())))
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// (message count, prior summary) for every call so far
        pub fn inputs(&self) -> Vec<(usize, Option<String>)> {
            self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize(&self, messages: &[Message], prior_summary: Option<&str>) -> Result<String, ServiceError> {
            debug!(message_count = messages.len(), "MockSummarizer::summarize: called");
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut inputs) = self.inputs.lock() {
                inputs.push((messages.len(), prior_summary.map(str::to_string)));
            }
            self.reply.clone()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_generator_returns_replies() {
            let generator = MockGenerator::new(vec![Ok("one".to_string()), Ok("two".to_string())]);
            let snapshot = SessionSnapshot::new();
            let ctx = GenerationContext::from_snapshot(&snapshot);

            assert_eq!(generator.generate("a", &ctx).await.unwrap(), "one");
            assert_eq!(generator.generate("b", &ctx).await.unwrap(), "two");
            assert!(generator.generate("c", &ctx).await.is_err());
            assert_eq!(generator.call_count(), 3);
        }

        #[tokio::test]
        async fn test_mock_summarizer_records_inputs() {
            let summarizer = MockSummarizer::fixed("digest");
            let messages = vec![Message::user("hi"), Message::agent("hello")];

            let out = summarizer.summarize(&messages, Some("before")).await.unwrap();
            assert_eq!(out, "digest");
            assert_eq!(summarizer.inputs(), vec![(2, Some("before".to_string()))]);
        }
    }
}
