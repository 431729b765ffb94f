//! Planagent - state core for a dialogue-driven planning tool
//!
//! Keeps an unbounded conversation usable inside a fixed context budget,
//! maintains a versioned plan that evolves under repeated edits, and persists
//! whole sessions compactly across restarts with bounded undo/redo.
//!
//! # Core Concepts
//!
//! - **Snapshots**: a session is one `SessionSnapshot` value; it is the unit of
//!   persistence and of undo
//! - **Pure edits**: `apply_edit` validates and builds a new plan version
//!   without touching the old one
//! - **Compression**: over 70% of the token budget, older messages fold into a
//!   summary and the last few stay verbatim
//! - **Compaction**: at save time the stored tail is capped regardless of
//!   token pressure
//!
//! # Modules
//!
//! - [`domain`] - Messages, plans, dependency graph, snapshots
//! - [`context`] - Token estimates and budget-driven compression
//! - [`ledger`] - Undo/redo ring of snapshots
//! - [`store`] - Compacting snapshot persistence over `sessionstore`
//! - [`controller`] - Session lifecycle and turn orchestration
//! - [`llm`] - Text-generation and summarization contracts
//! - [`config`] - Configuration types and loading

pub mod config;
pub mod context;
pub mod controller;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use context::{CompressionOutcome, ContextWindow};
pub use controller::{SaveOutcome, Session, SessionController, SessionState, Turn, TurnOutcome};
pub use domain::{
    ConversationState, EditOp, HistoryEntry, Message, Plan, PlanEdit, PlanStep, Role, SessionSnapshot, StepChange,
    StepId, apply_edit, fork_plan,
};
pub use error::{LedgerError, SessionError, SessionWarning, ValidationError};
pub use ledger::UndoLedger;
pub use llm::{ExtractiveSummarizer, GenerationContext, ServiceError, Summarizer, TextGenerator};
pub use store::{SaveReport, SessionSummary, SnapshotStore};
