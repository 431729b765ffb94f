//! Context window management
//!
//! Keeps the live conversation within a token budget by folding older
//! messages into a summary while the most recent ones stay verbatim.

pub mod tokens;
mod window;

pub use tokens::conversation_tokens;
pub use window::{CompressionOutcome, ContextWindow};
