//! Undo/redo ledger
//!
//! A fixed-capacity ring of session snapshots, most recent last. Pushing past
//! capacity overwrites the oldest slot in place. Snapshots popped by undo go
//! onto a redo stack that any new checkpoint clears.

use tracing::debug;

use crate::domain::SessionSnapshot;
use crate::error::LedgerError;

/// Default number of checkpoints kept
pub const DEFAULT_UNDO_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct UndoLedger {
    slots: Vec<Option<SessionSnapshot>>,
    /// Index of the oldest live slot
    head: usize,
    len: usize,
    redo: Vec<SessionSnapshot>,
}

impl Default for UndoLedger {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoLedger {
    /// Create a ledger holding at most `capacity` checkpoints (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
            redo: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of checkpoints held
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Undo needs a state to step back to
    pub fn can_undo(&self) -> bool {
        self.len >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Most recent checkpoint
    pub fn current(&self) -> Option<&SessionSnapshot> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.slot(self.len - 1)].as_ref()
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Push onto the ring without touching redo
    fn push(&mut self, snapshot: SessionSnapshot) {
        if self.len == self.slots.len() {
            // Full: the oldest slot becomes the newest
            let idx = self.head;
            self.slots[idx] = Some(snapshot);
            self.head = self.slot(1);
            debug!(evicted_slot = idx, "UndoLedger::push: evicted oldest checkpoint");
        } else {
            let idx = self.slot(self.len);
            self.slots[idx] = Some(snapshot);
            self.len += 1;
        }
    }

    fn pop(&mut self) -> Option<SessionSnapshot> {
        if self.len == 0 {
            return None;
        }
        let idx = self.slot(self.len - 1);
        self.len -= 1;
        self.slots[idx].take()
    }

    /// Record a committed state; invalidates redo
    pub fn checkpoint(&mut self, snapshot: &SessionSnapshot) {
        debug!(id = %snapshot.id, len = self.len, "UndoLedger::checkpoint: called");
        self.push(snapshot.clone());
        self.redo.clear();
    }

    /// Step back one checkpoint and return the state now current
    pub fn undo(&mut self) -> Result<SessionSnapshot, LedgerError> {
        debug!(len = self.len, "UndoLedger::undo: called");
        if !self.can_undo() {
            return Err(LedgerError::NothingToUndo);
        }
        let popped = self.pop().ok_or(LedgerError::NothingToUndo)?;
        self.redo.push(popped);
        self.current().cloned().ok_or(LedgerError::NothingToUndo)
    }

    /// Re-apply the most recently undone checkpoint and return it
    pub fn redo(&mut self) -> Result<SessionSnapshot, LedgerError> {
        debug!(redo_len = self.redo.len(), "UndoLedger::redo: called");
        let snapshot = self.redo.pop().ok_or(LedgerError::NothingToRedo)?;
        self.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop every checkpoint and the redo stack
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.head = 0;
        self.len = 0;
        self.redo.clear();
    }
}
