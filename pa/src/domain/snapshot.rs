//! SessionSnapshot domain type
//!
//! The atomic unit of persistence and of undo/redo.

use serde::{Deserialize, Serialize};
use sessionstore::SessionHeader;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use super::message::ConversationState;
use super::now_ms;
use super::plan::Plan;

/// Opaque stable session identifier
pub type SessionId = String;

/// Generate a new time-ordered session ID
pub fn generate_session_id() -> SessionId {
    Uuid::now_v7().to_string()
}

/// Everything that makes up one session at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub conversation: ConversationState,
    pub plan: Option<Plan>,
    /// User preference bag
    pub preferences: BTreeMap<String, String>,
    /// User-assigned tags
    pub tags: Vec<String>,
    /// Number of user turns processed
    pub turn: u32,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last modification timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::with_id(generate_session_id())
    }
}

impl SessionSnapshot {
    /// Create an empty snapshot with a fresh ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty snapshot with the given ID
    pub fn with_id(id: impl Into<SessionId>) -> Self {
        let now = now_ms();
        let id = id.into();
        debug!(%id, "SessionSnapshot::with_id: called");
        Self {
            id,
            conversation: ConversationState::new(),
            plan: None,
            preferences: BTreeMap::new(),
            tags: Vec::new(),
            turn: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display title: the plan title, else a short form of the ID
    pub fn title(&self) -> String {
        match &self.plan {
            Some(plan) => plan.title().to_string(),
            None => format!("Session {}", self.id.chars().take(8).collect::<String>()),
        }
    }

    /// Mark the snapshot as modified now
    pub fn touch(&mut self) {
        self.updated_at = now_ms().max(self.updated_at);
    }

    /// Listing header for the session store
    pub fn header(&self) -> SessionHeader {
        SessionHeader {
            id: self.id.clone(),
            title: self.title(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.conversation.total_message_count(),
            has_plan: self.plan.is_some(),
        }
    }

    /// Add tags, keeping existing ones and skipping duplicates
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}
