//! Session persistence with save-time compaction

mod compactor;
mod sessions;

pub use compactor::{CompactionOutcome, Compactor, MAX_STORED_MESSAGES};
pub use sessions::{MatchReason, SaveReport, SearchHit, SessionSummary, SnapshotStore, open_in};
