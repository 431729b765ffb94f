//! Error types for the planning core

use sessionstore::StoreError;
use thiserror::Error;

use crate::domain::StepId;
use crate::llm::ServiceError;

/// An edit was rejected before anything was committed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Dependency cycle between steps {path:?}")]
    CyclicDependency { path: Vec<StepId> },

    #[error("Unknown step id: {0}")]
    UnknownStep(StepId),

    #[error("Step {step} does not depend on step {depends_on}")]
    MissingDependency { step: StepId, depends_on: StepId },

    #[error("Unknown metadata key: {0}")]
    UnknownExtension(String),

    #[error("Reorder must list every current step exactly once")]
    InvalidReorder,

    #[error("Edit contains no operations")]
    EmptyEdit,
}

/// Undo/redo ledger failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Errors surfaced by the session controller
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid edit: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Corrupt session {id}: {reason}")]
    CorruptSession { id: String, reason: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Session has ended")]
    SessionEnded,

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::SessionNotFound(id),
            StoreError::Corrupt { id, reason } => SessionError::CorruptSession { id, reason },
            other => SessionError::Storage(other),
        }
    }
}

impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NothingToUndo => SessionError::NothingToUndo,
            LedgerError::NothingToRedo => SessionError::NothingToRedo,
        }
    }
}

/// A recoverable problem reported alongside a successful result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionWarning {
    #[error("No reply this turn: {0}")]
    ReplyUnavailable(ServiceError),

    #[error("Context compression skipped: {0}")]
    CompressionSkipped(ServiceError),

    #[error("Recent messages alone use {tokens} tokens, over the context threshold")]
    ContextOverBudget { tokens: u32 },

    #[error("Saved without compaction: {0}")]
    CompactionSkipped(ServiceError),
}

impl SessionError {
    /// Whether the session is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SessionError::SessionEnded | SessionError::Storage(_) | SessionError::InvalidConfig(_)
        )
    }
}
