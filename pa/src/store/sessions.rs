//! Typed session persistence on top of `sessionstore`

use std::path::Path;
use std::time::Duration;

use sessionstore::{SessionEntry, SessionStore};
use tracing::{debug, info, warn};

use super::compactor::{CompactionOutcome, Compactor};
use crate::config::StorageConfig;
use crate::domain::{Plan, SessionSnapshot, fork_plan};
use crate::error::{SessionError, SessionWarning};
use crate::llm::Summarizer;

/// Listing record built from the stored header alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub message_count: u64,
    pub has_plan: bool,
    pub size_bytes: u64,
}

impl From<SessionEntry> for SessionSummary {
    fn from(entry: SessionEntry) -> Self {
        let header = entry.header;
        Self {
            id: header.id,
            title: header.title,
            tags: header.tags,
            created_at: header.created_at,
            updated_at: header.updated_at,
            message_count: header.message_count,
            has_plan: header.has_plan,
            size_bytes: entry.size_bytes,
        }
    }
}

/// Which part of a session matched a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Title,
    Tag,
    PlanContent,
    Summary,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Tag => write!(f, "tag"),
            Self::PlanContent => write!(f, "plan content"),
            Self::Summary => write!(f, "message summary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub session: SessionSummary,
    pub reason: MatchReason,
}

/// What a save did
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub bytes: u64,
    pub compaction: CompactionOutcome,
    /// The snapshot as written, after any compaction
    pub snapshot: SessionSnapshot,
}

impl SaveReport {
    pub fn compacted(&self) -> bool {
        matches!(self.compaction, CompactionOutcome::Compacted { .. })
    }

    pub fn warnings(&self) -> Vec<SessionWarning> {
        match &self.compaction {
            CompactionOutcome::Failed(e) => vec![SessionWarning::CompactionSkipped(e.clone())],
            _ => Vec::new(),
        }
    }
}

/// Session snapshots on disk, compacted on save
pub struct SnapshotStore {
    store: SessionStore,
    compactor: Compactor,
}

impl SnapshotStore {
    pub fn new(store: SessionStore, compactor: Compactor) -> Self {
        Self { store, compactor }
    }

    /// Open the store described by `config`; `timeout` bounds each compaction summary
    pub fn open(config: &StorageConfig, timeout: Duration) -> Result<Self, SessionError> {
        debug!(sessions_dir = ?config.sessions_dir, "SnapshotStore::open: called");
        let store = SessionStore::open(&config.sessions_dir)?.with_compression_level(config.compression_level);
        Ok(Self::new(store, Compactor::new(config.max_stored_messages, timeout)))
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn compactor(&self) -> &Compactor {
        &self.compactor
    }

    /// Compact if the tail is over the limit, then write
    ///
    /// A failing summarizer does not fail the save: the snapshot is written
    /// uncompacted and the report carries a warning.
    pub async fn save(&self, snapshot: &SessionSnapshot, summarizer: &dyn Summarizer) -> Result<SaveReport, SessionError> {
        debug!(id = %snapshot.id, retained = snapshot.conversation.len(), "SnapshotStore::save: called");
        let mut snapshot = snapshot.clone();
        let compaction = self.compactor.compact(&mut snapshot.conversation, summarizer).await;
        let bytes = self.write(&snapshot)?;
        Ok(SaveReport {
            bytes,
            compaction,
            snapshot,
        })
    }

    /// Write as-is, no compaction
    pub fn write(&self, snapshot: &SessionSnapshot) -> Result<u64, SessionError> {
        Ok(self.store.save(&snapshot.header(), snapshot)?)
    }

    pub fn load(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        debug!(%id, "SnapshotStore::load: called");
        let (_header, snapshot): (_, SessionSnapshot) = self.store.load(id)?;
        Ok(snapshot)
    }

    /// Every stored session, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self.store.list()?.into_iter().map(SessionSummary::from).collect())
    }

    /// Sessions carrying `tag`, most recently updated first
    pub fn list_by_tag(&self, tag: &str) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.store.exists(id)
    }

    pub fn size(&self, id: &str) -> Result<u64, SessionError> {
        Ok(self.store.size(id)?)
    }

    /// Remove a stored session; false if there was none
    pub fn delete(&self, id: &str) -> Result<bool, SessionError> {
        Ok(self.store.delete(id)?)
    }

    /// Case-insensitive search over title, tags, plan text and summary
    ///
    /// Title and tag matches come from headers; the body is only decoded for
    /// sessions that did not match on those.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, SessionError> {
        debug!(%query, "SnapshotStore::search: called");
        let needle = query.to_lowercase();
        let mut hits = Vec::new();

        for session in self.list_sessions()? {
            let reason = if session.title.to_lowercase().contains(&needle) {
                Some(MatchReason::Title)
            } else if session.tags.iter().any(|t| t.to_lowercase().contains(&needle)) {
                Some(MatchReason::Tag)
            } else {
                match self.load(&session.id) {
                    Ok(snapshot) => body_match(&snapshot, &needle),
                    Err(e) => {
                        warn!(id = %session.id, error = %e, "Skipping unreadable session in search");
                        None
                    }
                }
            };
            if let Some(reason) = reason {
                hits.push(SearchHit { session, reason });
            }
        }

        // list_sessions is already newest first
        Ok(hits)
    }

    /// Copy a stored session under a new id
    ///
    /// The copy keeps conversation, summary, preferences and tags. Its plan
    /// restarts at version 1 under the new title, and its turn counter at 0.
    pub fn fork(&self, id: &str, title: Option<&str>) -> Result<SessionSnapshot, SessionError> {
        debug!(%id, ?title, "SnapshotStore::fork: called");
        let source = self.load(id)?;
        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (Copy)", source.title()));

        let mut forked = SessionSnapshot::new();
        forked.conversation = source.conversation;
        forked.plan = source.plan.as_ref().map(|plan| fork_plan(plan, title.clone()));
        forked.preferences = source.preferences;
        forked.tags = source.tags;

        self.write(&forked)?;
        info!(source = %id, fork = %forked.id, "Forked session");
        Ok(forked)
    }

    /// Add tags to a stored session
    pub fn tag(&self, id: &str, tags: &[String]) -> Result<SessionSnapshot, SessionError> {
        debug!(%id, ?tags, "SnapshotStore::tag: called");
        let mut snapshot = self.load(id)?;
        snapshot.add_tags(tags.iter().cloned());
        snapshot.touch();
        self.write(&snapshot)?;
        Ok(snapshot)
    }

    /// Load, compact and rewrite a stored session
    pub async fn compact(&self, id: &str, summarizer: &dyn Summarizer) -> Result<SaveReport, SessionError> {
        debug!(%id, "SnapshotStore::compact: called");
        let snapshot = self.load(id)?;
        self.save(&snapshot, summarizer).await
    }
}

fn body_match(snapshot: &SessionSnapshot, needle: &str) -> Option<MatchReason> {
    if snapshot.plan.as_ref().is_some_and(|plan| plan_text(plan).contains(needle)) {
        return Some(MatchReason::PlanContent);
    }
    if snapshot
        .conversation
        .summary()
        .is_some_and(|s| s.to_lowercase().contains(needle))
    {
        return Some(MatchReason::Summary);
    }
    None
}

/// Lowercased searchable text of a plan
fn plan_text(plan: &Plan) -> String {
    let mut parts = vec![plan.title().to_string()];
    parts.extend(plan.steps().iter().map(|s| s.description.clone()));
    parts.extend(plan.metadata().milestones.iter().map(|m| m.label.clone()));
    parts.extend(plan.metadata().extensions.iter().map(|(k, v)| format!("{} {}", k, v)));
    parts.join("\n").to_lowercase()
}

/// Open a store in `dir` with default limits
pub fn open_in(dir: &Path, timeout: Duration) -> Result<SnapshotStore, SessionError> {
    let config = StorageConfig {
        sessions_dir: dir.to_path_buf(),
        ..Default::default()
    };
    SnapshotStore::open(&config, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, PlanEdit, apply_edit};
    use crate::llm::ExtractiveSummarizer;
    use crate::llm::client::mock::MockSummarizer;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SnapshotStore) {
        let temp = TempDir::new().unwrap();
        let store = open_in(temp.path(), Duration::from_secs(5)).unwrap();
        (temp, store)
    }

    fn snapshot_with_messages(n: usize) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::new();
        for i in 0..n {
            if i % 2 == 0 {
                snapshot.conversation.push(Message::user(format!("question {}", i)));
            } else {
                snapshot.conversation.push(Message::agent(format!("answer {}", i)));
            }
        }
        snapshot
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let (_temp, store) = setup();
        let mut snapshot = snapshot_with_messages(6);
        snapshot.plan = Some(
            apply_edit(None, &PlanEdit::new().title("Garden").add_step("Dig").add_step("Plant")).unwrap(),
        );
        snapshot.preferences.insert("tone".to_string(), "brief".to_string());

        let report = store.save(&snapshot, &ExtractiveSummarizer::default()).await.unwrap();
        assert!(!report.compacted());
        assert!(report.warnings().is_empty());

        assert_eq!(store.load(&snapshot.id).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_save_compacts_long_tail() {
        let (_temp, store) = setup();
        let snapshot = snapshot_with_messages(25);

        let report = store.save(&snapshot, &ExtractiveSummarizer::default()).await.unwrap();

        assert!(report.compacted());
        let loaded = store.load(&snapshot.id).unwrap();
        assert_eq!(loaded.conversation.len(), 20);
        assert_eq!(loaded.conversation.total_message_count(), 25);
        assert!(loaded.conversation.summary().is_some());
        assert_eq!(loaded, report.snapshot);
    }

    #[tokio::test]
    async fn test_save_with_failing_summarizer_warns() {
        let (_temp, store) = setup();
        let snapshot = snapshot_with_messages(25);

        let report = store.save(&snapshot, &MockSummarizer::failing()).await.unwrap();

        assert_eq!(report.warnings().len(), 1);
        assert_eq!(store.load(&snapshot.id).unwrap().conversation.len(), 25);
    }

    #[test]
    fn test_load_unknown_is_not_found() {
        let (_temp, store) = setup();
        assert!(matches!(store.load("missing"), Err(SessionError::SessionNotFound(_))));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let (temp, store) = setup();
        std::fs::write(temp.path().join("broken.session"), b"not a session").unwrap();
        assert!(matches!(store.load("broken"), Err(SessionError::CorruptSession { .. })));
    }

    #[test]
    fn test_list_and_tag_filter() {
        let (_temp, store) = setup();
        let mut a = SessionSnapshot::new();
        a.tags = vec!["work".to_string()];
        let b = SessionSnapshot::new();
        store.write(&a).unwrap();
        store.write(&b).unwrap();

        assert_eq!(store.list_sessions().unwrap().len(), 2);
        let tagged = store.list_by_tag("work").unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, a.id);
    }

    #[test]
    fn test_search_reasons() {
        let (_temp, store) = setup();

        let mut by_title = SessionSnapshot::new();
        by_title.plan = Some(apply_edit(None, &PlanEdit::new().title("Kitchen remodel")).unwrap());
        let mut by_tag = SessionSnapshot::new();
        by_tag.tags = vec!["kitchen".to_string()];
        let mut by_plan = SessionSnapshot::new();
        by_plan.plan = Some(apply_edit(None, &PlanEdit::new().title("House").add_step("Order kitchen tiles")).unwrap());
        let mut by_summary = snapshot_with_messages(4);
        by_summary.conversation.fold_into_summary(2, "User: talked about the kitchen".to_string());
        let unrelated = SessionSnapshot::new();

        for s in [&by_title, &by_tag, &by_plan, &by_summary, &unrelated] {
            store.write(s).unwrap();
        }

        let hits = store.search("KITCHEN").unwrap();
        let reason_of = |id: &str| hits.iter().find(|h| h.session.id == id).map(|h| h.reason);

        assert_eq!(hits.len(), 4);
        assert_eq!(reason_of(&by_title.id), Some(MatchReason::Title));
        assert_eq!(reason_of(&by_tag.id), Some(MatchReason::Tag));
        assert_eq!(reason_of(&by_plan.id), Some(MatchReason::PlanContent));
        assert_eq!(reason_of(&by_summary.id), Some(MatchReason::Summary));
    }

    #[test]
    fn test_fork_copies_under_new_id() {
        let (_temp, store) = setup();
        let mut source = snapshot_with_messages(4);
        source.turn = 2;
        source.plan = Some(apply_edit(None, &PlanEdit::new().title("Trip").add_step("Book")).unwrap());
        store.write(&source).unwrap();

        let forked = store.fork(&source.id, None).unwrap();

        assert_ne!(forked.id, source.id);
        assert_eq!(forked.title(), "Trip (Copy)");
        assert_eq!(forked.turn, 0);
        assert_eq!(forked.conversation, source.conversation);
        assert_eq!(forked.plan.as_ref().map(|p| p.version()), Some(1));
        assert!(store.exists(&forked.id));
        assert!(store.exists(&source.id));
    }

    #[test]
    fn test_fork_keeps_summary_and_count() {
        let (_temp, store) = setup();
        let mut source = snapshot_with_messages(6);
        source.conversation.fold_into_summary(2, "Discussed the budget".to_string());
        store.write(&source).unwrap();

        let forked = store.fork(&source.id, Some("Budget v2")).unwrap();

        assert_eq!(forked.conversation.summary(), Some("Discussed the budget"));
        assert_eq!(forked.conversation.total_message_count(), 6);
    }

    #[test]
    fn test_tag_adds_without_duplicates() {
        let (_temp, store) = setup();
        let mut snapshot = SessionSnapshot::new();
        snapshot.tags = vec!["a".to_string()];
        store.write(&snapshot).unwrap();

        store.tag(&snapshot.id, &["a".to_string(), "b".to_string()]).unwrap();

        let loaded = store.load(&snapshot.id).unwrap();
        assert_eq!(loaded.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_compact_stored_session() {
        let (_temp, store) = setup();
        let snapshot = snapshot_with_messages(30);
        store.write(&snapshot).unwrap();
        let before = store.size(&snapshot.id).unwrap();

        let report = store.compact(&snapshot.id, &ExtractiveSummarizer::default()).await.unwrap();

        assert!(report.compacted());
        assert_eq!(store.load(&snapshot.id).unwrap().conversation.len(), 20);
        assert!(store.size(&snapshot.id).unwrap() > 0);
        assert!(before > 0);
    }

    #[test]
    fn test_delete() {
        let (_temp, store) = setup();
        let snapshot = SessionSnapshot::new();
        store.write(&snapshot).unwrap();

        assert!(store.delete(&snapshot.id).unwrap());
        assert!(!store.exists(&snapshot.id));
        assert!(!store.delete(&snapshot.id).unwrap());
    }
}
