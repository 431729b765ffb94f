//! Service contracts for the planning core
//!
//! Text generation and summarization are external collaborators. Calls to
//! them go through `with_timeout` so a stuck service costs one bounded wait
//! rather than the whole conversation.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

pub mod client;
mod error;
mod extractive;

pub use client::{GenerationContext, Summarizer, TextGenerator};
pub use error::ServiceError;
pub use extractive::ExtractiveSummarizer;

/// Run a service call with a bounded wait
///
/// On elapse the call's future is dropped, which cancels it, and
/// `ServiceError::Timeout` is returned.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    debug!(?limit, "with_timeout: called");
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?limit, "Service call timed out");
            Err(ServiceError::Timeout(limit))
        }
    }
}
