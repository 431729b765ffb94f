//! Save-time compaction
//!
//! Bounds the stored tail to a fixed message count regardless of token
//! pressure. Everything older, plus the prior summary, is handed to the
//! summarizer and replaced by its reply.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::ConversationState;
use crate::llm::{ServiceError, Summarizer, with_timeout};

/// Default number of messages kept verbatim on disk
pub const MAX_STORED_MESSAGES: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum CompactionOutcome {
    /// Tail already within the limit
    NotNeeded,
    /// `summarized` messages were folded into the summary
    Compacted { summarized: usize },
    /// Summarizer failed; the conversation is untouched
    Failed(ServiceError),
}

#[derive(Debug, Clone, Copy)]
pub struct Compactor {
    max_stored: usize,
    timeout: Duration,
}

impl Compactor {
    pub fn new(max_stored: usize, timeout: Duration) -> Self {
        Self { max_stored, timeout }
    }

    pub fn max_stored(&self) -> usize {
        self.max_stored
    }

    pub fn needs_compaction(&self, conv: &ConversationState) -> bool {
        conv.len() > self.max_stored
    }

    pub async fn compact(&self, conv: &mut ConversationState, summarizer: &dyn Summarizer) -> CompactionOutcome {
        debug!(retained = conv.len(), max_stored = self.max_stored, "Compactor::compact: called");
        if !self.needs_compaction(conv) {
            return CompactionOutcome::NotNeeded;
        }

        let older = conv.older_than_tail(self.max_stored);
        match with_timeout(self.timeout, summarizer.summarize(older, conv.summary())).await {
            Ok(summary) => {
                let summarized = conv.fold_into_summary(self.max_stored, summary);
                info!(summarized, retained = conv.len(), "Compacted conversation for storage");
                CompactionOutcome::Compacted { summarized }
            }
            Err(e) => {
                warn!(error = %e, "Compaction summarizer failed, storing uncompacted");
                CompactionOutcome::Failed(e)
            }
        }
    }
}
