//! Session controller
//!
//! Sequences each turn through the document model, the context window, and
//! the undo ledger, and drives save/load through the snapshot store.

mod session;
mod turns;

pub use session::{Session, SessionState};
pub use turns::{SaveOutcome, SessionController, Turn, TurnOutcome};
