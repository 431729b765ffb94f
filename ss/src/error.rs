//! Session store error types

use thiserror::Error;

/// Errors that can occur while reading or writing session files
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Corrupt session {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

impl StoreError {
    pub(crate) fn corrupt(id: &str, reason: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error means the session does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Check if this error means the stored bytes could not be decoded
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}
