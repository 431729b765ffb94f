//! Session value and lifecycle

use tracing::{debug, info};

use crate::domain::{ConversationState, Plan, SessionSnapshot};
use crate::error::SessionError;
use crate::ledger::UndoLedger;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing committed yet
    Fresh,
    /// Has uncommitted-to-disk changes, or was just loaded
    Active,
    /// Durably written; still mutable
    Saved,
    /// Closed; every further operation fails
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Active => write!(f, "active"),
            Self::Saved => write!(f, "saved"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// One live session, owned by the caller
///
/// Holds the current snapshot and its undo history. The ledger's latest
/// checkpoint always equals `snapshot`.
#[derive(Debug, Clone)]
pub struct Session {
    snapshot: SessionSnapshot,
    ledger: UndoLedger,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(snapshot: SessionSnapshot, undo_capacity: usize, state: SessionState) -> Self {
        let mut ledger = UndoLedger::new(undo_capacity);
        ledger.checkpoint(&snapshot);
        Self {
            snapshot,
            ledger,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.snapshot.id
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.snapshot.plan.as_ref()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.snapshot.conversation
    }

    pub fn can_undo(&self) -> bool {
        self.state != SessionState::Ended && self.ledger.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state != SessionState::Ended && self.ledger.can_redo()
    }

    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        Ok(())
    }

    /// Install a new current snapshot and checkpoint it
    pub(crate) fn commit(&mut self, mut snapshot: SessionSnapshot) {
        snapshot.touch();
        debug!(id = %snapshot.id, from = %self.state, "Session::commit: called");
        self.ledger.checkpoint(&snapshot);
        self.snapshot = snapshot;
        self.state = SessionState::Active;
    }

    /// Adopt the snapshot as written by a save
    pub(crate) fn mark_saved(&mut self, written: SessionSnapshot, changed: bool) {
        if changed {
            self.ledger.checkpoint(&written);
            self.snapshot = written;
        }
        self.state = SessionState::Saved;
    }

    /// Step back to the previous checkpoint
    pub fn undo(&mut self) -> Result<&SessionSnapshot, SessionError> {
        self.ensure_open()?;
        self.snapshot = self.ledger.undo()?;
        self.state = SessionState::Active;
        Ok(&self.snapshot)
    }

    /// Re-apply the most recently undone checkpoint
    pub fn redo(&mut self) -> Result<&SessionSnapshot, SessionError> {
        self.ensure_open()?;
        self.snapshot = self.ledger.redo()?;
        self.state = SessionState::Active;
        Ok(&self.snapshot)
    }

    /// End the session; closing twice is a no-op
    pub fn close(&mut self) {
        if self.state != SessionState::Ended {
            info!(id = %self.snapshot.id, "Session closed");
            self.state = SessionState::Ended;
            self.ledger.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;

    fn session() -> Session {
        Session::new(SessionSnapshot::with_id("session-test"), 10, SessionState::Fresh)
    }

    #[test]
    fn test_fresh_session_cannot_undo() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Fresh);
        assert!(!session.can_undo());
        assert!(matches!(session.undo(), Err(SessionError::NothingToUndo)));
    }

    #[test]
    fn test_commit_then_undo_restores_previous() {
        let mut session = session();
        let initial = session.snapshot().clone();

        let mut next = initial.clone();
        next.conversation.push(Message::user("hello"));
        session.commit(next);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.conversation().len(), 1);

        let restored = session.undo().unwrap().clone();
        assert_eq!(restored, initial);
        assert_eq!(session.redo().unwrap().conversation.len(), 1);
    }

    #[test]
    fn test_closed_session_rejects_everything() {
        let mut session = session();
        session.close();
        session.close();

        assert!(session.is_ended());
        assert!(!session.can_undo());
        assert!(matches!(session.undo(), Err(SessionError::SessionEnded)));
        assert!(matches!(session.redo(), Err(SessionError::SessionEnded)));
        assert!(session.ensure_open().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Saved.to_string(), "saved");
    }
}
