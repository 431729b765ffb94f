//! Service error types

use std::time::Duration;
use thiserror::Error;

/// Errors reported by the text-generation and summarization services
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Check if the call was cut off by the bounded wait
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Timeout(_))
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable(_) => true,
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            ServiceError::Timeout(_) => true,
            ServiceError::InvalidResponse(_) => false,
        }
    }
}
