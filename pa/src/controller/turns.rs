//! Turn orchestration
//!
//! The controller owns the collaborators (services, store, context policy)
//! but never a session: every operation takes the caller's `Session`.
//! Mutations are built on a working copy and only installed once they have
//! validated, so a failed call leaves the session as it was.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::session::{Session, SessionState};
use crate::config::Config;
use crate::context::{CompressionOutcome, ContextWindow};
use crate::domain::{Message, PlanEdit, SessionSnapshot, apply_edit};
use crate::error::{SessionError, SessionWarning};
use crate::llm::{GenerationContext, Summarizer, TextGenerator, with_timeout};
use crate::store::{SessionSummary, SnapshotStore};

/// One user turn: text, optionally with a plan edit it implies
#[derive(Debug, Clone, Default)]
pub struct Turn {
    pub text: String,
    pub edit: Option<PlanEdit>,
}

impl Turn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            edit: None,
        }
    }

    pub fn with_edit(mut self, edit: PlanEdit) -> Self {
        self.edit = Some(edit);
        self
    }
}

/// What a committed turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Agent reply; `None` when generation failed
    pub reply: Option<String>,
    /// Plan version after the turn
    pub plan_version: Option<u32>,
    pub compression: CompressionOutcome,
    pub warnings: Vec<SessionWarning>,
}

/// What an explicit save did
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub id: String,
    pub bytes: u64,
    pub compacted: bool,
    pub warnings: Vec<SessionWarning>,
}

pub struct SessionController {
    generator: Arc<dyn TextGenerator>,
    summarizer: Arc<dyn Summarizer>,
    store: SnapshotStore,
    window: ContextWindow,
    undo_capacity: usize,
    timeout: Duration,
}

impl SessionController {
    /// Build a controller from configuration, opening the session store
    ///
    /// The configuration is validated first; a bad one fails with `InvalidConfig`.
    pub fn new(
        config: &Config,
        generator: Arc<dyn TextGenerator>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        let timeout = config.services.timeout();
        let store = SnapshotStore::open(&config.storage, timeout)?;
        Ok(Self {
            generator,
            summarizer,
            store,
            window: ContextWindow::from_config(&config.context),
            undo_capacity: config.undo.capacity,
            timeout,
        })
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn window(&self) -> &ContextWindow {
        &self.window
    }

    /// Start an empty session
    pub fn new_session(&self) -> Session {
        let session = Session::new(SessionSnapshot::new(), self.undo_capacity, SessionState::Fresh);
        info!(id = %session.id(), "Started new session");
        session
    }

    /// Resume a stored session
    pub fn load(&self, id: &str) -> Result<Session, SessionError> {
        debug!(%id, "SessionController::load: called");
        let snapshot = self.store.load(id)?;
        info!(%id, messages = snapshot.conversation.total_message_count(), "Loaded session");
        Ok(Session::new(snapshot, self.undo_capacity, SessionState::Active))
    }

    /// Process one user turn
    ///
    /// An invalid edit fails the whole turn before anything is appended.
    /// Service failures do not: the turn commits without a reply or without
    /// compression, and the outcome carries a warning.
    pub async fn submit(&self, session: &mut Session, turn: Turn) -> Result<TurnOutcome, SessionError> {
        debug!(id = %session.id(), has_edit = turn.edit.is_some(), "SessionController::submit: called");
        session.ensure_open()?;

        let mut working = session.snapshot().clone();
        if let Some(edit) = &turn.edit {
            working.plan = Some(apply_edit(working.plan.as_ref(), edit)?);
        }
        working.conversation.push(Message::user(turn.text.as_str()));
        working.turn += 1;

        let mut warnings = Vec::new();
        let reply = {
            let context = GenerationContext::from_snapshot(&working);
            with_timeout(self.timeout, self.generator.generate(&turn.text, &context)).await
        };
        let reply = match reply {
            Ok(text) => {
                working.conversation.push(Message::agent(text.as_str()));
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "Text generation failed, committing turn without a reply");
                warnings.push(SessionWarning::ReplyUnavailable(e));
                None
            }
        };

        let compression = self
            .window
            .compress(&mut working.conversation, self.summarizer.as_ref(), self.timeout)
            .await;
        match &compression {
            CompressionOutcome::Skipped(e) => warnings.push(SessionWarning::CompressionSkipped(e.clone())),
            CompressionOutcome::OverBudget { tokens, .. } => {
                warnings.push(SessionWarning::ContextOverBudget { tokens: *tokens })
            }
            _ => {}
        }

        let plan_version = working.plan.as_ref().map(|p| p.version());
        session.commit(working);

        Ok(TurnOutcome {
            reply,
            plan_version,
            compression,
            warnings,
        })
    }

    /// Apply a plan edit outside of a conversational turn; returns the new version
    pub fn edit_plan(&self, session: &mut Session, edit: &PlanEdit) -> Result<u32, SessionError> {
        debug!(id = %session.id(), ops = edit.ops.len(), "SessionController::edit_plan: called");
        session.ensure_open()?;

        let plan = apply_edit(session.plan(), edit)?;
        let version = plan.version();
        let mut working = session.snapshot().clone();
        working.plan = Some(plan);
        session.commit(working);
        Ok(version)
    }

    pub fn set_preference(
        &self,
        session: &mut Session,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        session.ensure_open()?;
        let mut working = session.snapshot().clone();
        working.preferences.insert(key.into(), value.into());
        session.commit(working);
        Ok(())
    }

    pub fn undo(&self, session: &mut Session) -> Result<(), SessionError> {
        session.undo()?;
        debug!(id = %session.id(), "Undid last change");
        Ok(())
    }

    pub fn redo(&self, session: &mut Session) -> Result<(), SessionError> {
        session.redo()?;
        debug!(id = %session.id(), "Redid last change");
        Ok(())
    }

    /// Compact if needed and write the session durably
    pub async fn save(&self, session: &mut Session) -> Result<SaveOutcome, SessionError> {
        debug!(id = %session.id(), "SessionController::save: called");
        session.ensure_open()?;

        let report = self.store.save(session.snapshot(), self.summarizer.as_ref()).await?;
        let compacted = report.compacted();
        let warnings = report.warnings();
        let bytes = report.bytes;
        session.mark_saved(report.snapshot, compacted);

        Ok(SaveOutcome {
            id: session.id().to_string(),
            bytes,
            compacted,
            warnings,
        })
    }

    /// Stored sessions, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        self.store.list_sessions()
    }

    /// End the session
    pub fn close(&self, session: &mut Session) {
        session.close();
    }
}
