//! Plan domain type
//!
//! A plan is a versioned document. Every committed edit produces a new value
//! with `version + 1` and appends one history entry holding the content as it
//! was before the edit, so any earlier version can be shown again.
//! Edits never touch the plan they were applied to.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::graph::{topological_order, validate_dependency_graph};
use super::now_ms;
use crate::error::ValidationError;

/// Step identifier, unique within a plan and never reused
pub type StepId = u32;

/// Title given to a plan created by an edit that does not name one
pub const DEFAULT_PLAN_TITLE: &str = "Untitled Plan";

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub description: String,
    pub completed: bool,
    /// Steps that must be completed before this one
    pub depends_on: BTreeSet<StepId>,
    /// Deadline (Unix milliseconds)
    #[serde(default)]
    pub due_at: Option<i64>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl PlanStep {
    pub fn new(id: StepId, description: impl Into<String>, now: i64) -> Self {
        Self {
            id,
            description: description.into(),
            completed: false,
            depends_on: BTreeSet::new(),
            due_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A step flagged as a key milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub step_id: StepId,
    pub label: String,
}

/// Free-form plan metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Milestones in the order they were marked
    pub milestones: Vec<Milestone>,
    /// Arbitrary key/value extensions
    pub extensions: BTreeMap<String, String>,
}

/// The editable part of a plan at one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanContent {
    pub title: String,
    pub steps: Vec<PlanStep>,
    pub metadata: PlanMetadata,
    /// Next id handed out by AddStep
    pub next_step_id: StepId,
}

impl PlanContent {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps: Vec::new(),
            metadata: PlanMetadata::default(),
            next_step_id: 1,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    fn step_mut(&mut self, id: StepId) -> Result<&mut PlanStep, ValidationError> {
        self.steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ValidationError::UnknownStep(id))
    }

    fn require(&self, id: StepId) -> Result<(), ValidationError> {
        self.step(id).map(|_| ()).ok_or(ValidationError::UnknownStep(id))
    }
}

/// Audit record for one committed edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Version this edit produced
    pub version: u32,
    /// When the edit was committed (Unix milliseconds)
    pub timestamp: i64,
    /// Human-readable description of the edit
    pub description: String,
    /// One line per applied operation
    pub changes: Vec<String>,
    /// Content of version `version - 1`
    pub previous: PlanContent,
}

/// A versioned plan with its full audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    content: PlanContent,
    version: u32,
    created_at: i64,
    updated_at: i64,
    history: Vec<HistoryEntry>,
}

/// A single plan operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOp {
    SetTitle(String),
    AddStep { description: String, depends_on: Vec<StepId> },
    UpdateStep { id: StepId, description: String },
    SetCompleted { id: StepId, completed: bool },
    RemoveStep { id: StepId },
    Reorder { order: Vec<StepId> },
    AddDependency { step: StepId, depends_on: StepId },
    RemoveDependency { step: StepId, depends_on: StepId },
    MarkMilestone { step: StepId, label: String },
    /// `None` clears the deadline
    SetDueDate { id: StepId, due_at: Option<i64> },
    SetExtension { key: String, value: String },
    RemoveExtension { key: String },
}

/// A batch of operations committed as one version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEdit {
    /// Overrides the generated change description
    pub description: Option<String>,
    pub ops: Vec<EditOp>,
}

impl PlanEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<EditOp>) -> Self {
        Self { description: None, ops }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn op(mut self, op: EditOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn title(self, title: impl Into<String>) -> Self {
        self.op(EditOp::SetTitle(title.into()))
    }

    pub fn add_step(self, description: impl Into<String>) -> Self {
        self.add_step_with_deps(description, &[])
    }

    pub fn add_step_with_deps(self, description: impl Into<String>, depends_on: &[StepId]) -> Self {
        self.op(EditOp::AddStep {
            description: description.into(),
            depends_on: depends_on.to_vec(),
        })
    }

    pub fn add_dependency(self, step: StepId, depends_on: StepId) -> Self {
        self.op(EditOp::AddDependency { step, depends_on })
    }

    pub fn complete(self, id: StepId) -> Self {
        self.op(EditOp::SetCompleted { id, completed: true })
    }

    pub fn remove_step(self, id: StepId) -> Self {
        self.op(EditOp::RemoveStep { id })
    }

    pub fn milestone(self, step: StepId, label: impl Into<String>) -> Self {
        self.op(EditOp::MarkMilestone {
            step,
            label: label.into(),
        })
    }

    pub fn due(self, id: StepId, due_at: i64) -> Self {
        self.op(EditOp::SetDueDate { id, due_at: Some(due_at) })
    }
}

/// How one step differs between two plan versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepChange {
    Added { id: StepId, description: String },
    Removed { id: StepId, description: String },
    Modified { id: StepId, before: String, after: String },
    Completed { id: StepId },
    Reopened { id: StepId },
}

impl StepChange {
    pub fn step_id(&self) -> StepId {
        match self {
            Self::Added { id, .. }
            | Self::Removed { id, .. }
            | Self::Modified { id, .. }
            | Self::Completed { id }
            | Self::Reopened { id } => *id,
        }
    }
}

impl std::fmt::Display for StepChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added { id, description } => write!(f, "+ step {}: {}", id, description),
            Self::Removed { id, description } => write!(f, "- step {}: {}", id, description),
            Self::Modified { id, before, after } => write!(f, "~ step {}: '{}' -> '{}'", id, before, after),
            Self::Completed { id } => write!(f, "✓ step {}", id),
            Self::Reopened { id } => write!(f, "○ step {}", id),
        }
    }
}

/// Step-level differences from `old` to `new`, ordered by step id
pub fn diff_contents(old: &PlanContent, new: &PlanContent) -> Vec<StepChange> {
    let before: BTreeMap<StepId, &PlanStep> = old.steps.iter().map(|s| (s.id, s)).collect();
    let after: BTreeMap<StepId, &PlanStep> = new.steps.iter().map(|s| (s.id, s)).collect();
    let ids: BTreeSet<StepId> = before.keys().chain(after.keys()).copied().collect();

    let mut changes = Vec::new();
    for id in ids {
        match (before.get(&id), after.get(&id)) {
            (None, Some(step)) => changes.push(StepChange::Added {
                id,
                description: step.description.clone(),
            }),
            (Some(step), None) => changes.push(StepChange::Removed {
                id,
                description: step.description.clone(),
            }),
            (Some(old), Some(new)) => {
                if old.description != new.description {
                    changes.push(StepChange::Modified {
                        id,
                        before: old.description.clone(),
                        after: new.description.clone(),
                    });
                }
                match (old.completed, new.completed) {
                    (false, true) => changes.push(StepChange::Completed { id }),
                    (true, false) => changes.push(StepChange::Reopened { id }),
                    _ => {}
                }
            }
            (None, None) => {}
        }
    }
    changes
}

/// Apply an edit, producing the next version of the plan
///
/// With no plan, a version-1 base plan is created first, so the first edit
/// yields version 2. The whole edit is validated (including the dependency
/// graph) before anything is committed; on error the caller's plan is
/// untouched.
pub fn apply_edit(plan: Option<&Plan>, edit: &PlanEdit) -> Result<Plan, ValidationError> {
    debug!(has_plan = plan.is_some(), ops = edit.ops.len(), "apply_edit: called");
    if edit.ops.is_empty() {
        return Err(ValidationError::EmptyEdit);
    }

    let now = now_ms();
    let base = match plan {
        Some(plan) => plan.clone(),
        None => {
            debug!("apply_edit: no plan, creating base version");
            Plan::new(DEFAULT_PLAN_TITLE, now)
        }
    };

    let mut content = base.content.clone();
    let mut changes = Vec::with_capacity(edit.ops.len());
    for op in &edit.ops {
        changes.push(apply_op(&mut content, op, now)?);
    }

    validate_dependency_graph(&content.steps).map_err(|path| {
        debug!(?path, "apply_edit: dependency cycle");
        ValidationError::CyclicDependency { path }
    })?;

    let version = base.version + 1;
    let description = edit.description.clone().unwrap_or_else(|| changes.join("; "));
    let mut history = base.history;
    history.push(HistoryEntry {
        version,
        timestamp: now,
        description,
        changes,
        previous: base.content,
    });

    debug!(version, "apply_edit: committed");
    Ok(Plan {
        content,
        version,
        created_at: base.created_at,
        updated_at: now,
        history,
    })
}

fn apply_op(content: &mut PlanContent, op: &EditOp, now: i64) -> Result<String, ValidationError> {
    match op {
        EditOp::SetTitle(title) => {
            let old = std::mem::replace(&mut content.title, title.clone());
            Ok(format!("Renamed plan: '{}' -> '{}'", old, title))
        }
        EditOp::AddStep {
            description,
            depends_on,
        } => {
            for &dep in depends_on {
                content.require(dep)?;
            }
            let id = content.next_step_id;
            content.next_step_id += 1;
            let mut step = PlanStep::new(id, description.clone(), now);
            step.depends_on = depends_on.iter().copied().collect();
            content.steps.push(step);
            Ok(format!("Added step {}: {}", id, description))
        }
        EditOp::UpdateStep { id, description } => {
            let step = content.step_mut(*id)?;
            let old = std::mem::replace(&mut step.description, description.clone());
            step.updated_at = now;
            Ok(format!("Updated step {}: '{}' -> '{}'", id, old, description))
        }
        EditOp::SetCompleted { id, completed } => {
            let step = content.step_mut(*id)?;
            step.completed = *completed;
            step.updated_at = now;
            if *completed {
                Ok(format!("Completed step {}", id))
            } else {
                Ok(format!("Reopened step {}", id))
            }
        }
        EditOp::RemoveStep { id } => {
            let index = content
                .steps
                .iter()
                .position(|s| s.id == *id)
                .ok_or(ValidationError::UnknownStep(*id))?;
            let removed = content.steps.remove(index);
            for step in &mut content.steps {
                step.depends_on.remove(id);
            }
            content.metadata.milestones.retain(|m| m.step_id != *id);
            Ok(format!("Removed step {}: {}", id, removed.description))
        }
        EditOp::Reorder { order } => {
            let current: BTreeSet<StepId> = content.steps.iter().map(|s| s.id).collect();
            let requested: BTreeSet<StepId> = order.iter().copied().collect();
            if order.len() != content.steps.len() || requested != current {
                return Err(ValidationError::InvalidReorder);
            }
            let mut by_id: BTreeMap<StepId, PlanStep> = content.steps.drain(..).map(|s| (s.id, s)).collect();
            content.steps = order.iter().filter_map(|id| by_id.remove(id)).collect();
            Ok(format!("Reordered steps to {:?}", order))
        }
        EditOp::AddDependency { step, depends_on } => {
            content.require(*depends_on)?;
            let target = content.step_mut(*step)?;
            target.depends_on.insert(*depends_on);
            target.updated_at = now;
            Ok(format!("Step {} now depends on step {}", step, depends_on))
        }
        EditOp::RemoveDependency { step, depends_on } => {
            let target = content.step_mut(*step)?;
            if !target.depends_on.remove(depends_on) {
                return Err(ValidationError::MissingDependency {
                    step: *step,
                    depends_on: *depends_on,
                });
            }
            target.updated_at = now;
            Ok(format!("Step {} no longer depends on step {}", step, depends_on))
        }
        EditOp::MarkMilestone { step, label } => {
            content.require(*step)?;
            let milestones = &mut content.metadata.milestones;
            match milestones.iter_mut().find(|m| m.step_id == *step) {
                Some(existing) => existing.label = label.clone(),
                None => milestones.push(Milestone {
                    step_id: *step,
                    label: label.clone(),
                }),
            }
            Ok(format!("Marked step {} as milestone '{}'", step, label))
        }
        EditOp::SetDueDate { id, due_at } => {
            let step = content.step_mut(*id)?;
            step.due_at = *due_at;
            step.updated_at = now;
            match due_at {
                Some(ms) => Ok(format!("Step {} due {}", id, format_ms(*ms))),
                None => Ok(format!("Cleared due date of step {}", id)),
            }
        }
        EditOp::SetExtension { key, value } => {
            content.metadata.extensions.insert(key.clone(), value.clone());
            Ok(format!("Set {} = {}", key, value))
        }
        EditOp::RemoveExtension { key } => {
            content
                .metadata
                .extensions
                .remove(key)
                .ok_or_else(|| ValidationError::UnknownExtension(key.clone()))?;
            Ok(format!("Removed {}", key))
        }
    }
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Copy the current content into a fresh version-1 plan with no history
pub fn fork_plan(plan: &Plan, title: impl Into<String>) -> Plan {
    let now = now_ms();
    let mut fork = Plan::new(title, now);
    fork.content.steps = plan.content.steps.clone();
    fork.content.metadata = plan.content.metadata.clone();
    fork.content.next_step_id = plan.content.next_step_id;
    fork
}

impl Plan {
    fn new(title: impl Into<String>, now: i64) -> Self {
        Self {
            content: PlanContent::new(title),
            version: 1,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    pub fn content(&self) -> &PlanContent {
        &self.content
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.content.steps
    }

    pub fn step(&self, id: StepId) -> Option<&PlanStep> {
        self.content.step(id)
    }

    pub fn metadata(&self) -> &PlanMetadata {
        &self.content.metadata
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Audit trail, oldest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// (completed, total) over the current steps
    pub fn progress(&self) -> (usize, usize) {
        let completed = self.content.steps.iter().filter(|s| s.completed).count();
        (completed, self.content.steps.len())
    }

    pub fn is_complete(&self) -> bool {
        let (completed, total) = self.progress();
        total > 0 && completed == total
    }

    /// Content as it was at `version`
    pub fn content_at(&self, version: u32) -> Option<&PlanContent> {
        if version == self.version {
            return Some(&self.content);
        }
        self.history
            .iter()
            .find(|entry| entry.version == version + 1)
            .map(|entry| &entry.previous)
    }

    /// Step changes between two versions of this plan; `None` if either is unknown
    pub fn diff(&self, from: u32, to: u32) -> Option<Vec<StepChange>> {
        Some(diff_contents(self.content_at(from)?, self.content_at(to)?))
    }

    /// Step changes made by the latest edit
    pub fn last_changes(&self) -> Vec<StepChange> {
        self.diff(self.version.saturating_sub(1), self.version).unwrap_or_default()
    }

    /// Incomplete steps whose deadline is before `now` (Unix milliseconds)
    pub fn overdue_steps(&self, now: i64) -> Vec<StepId> {
        self.content
            .steps
            .iter()
            .filter(|s| !s.completed && s.due_at.is_some_and(|due| due < now))
            .map(|s| s.id)
            .collect()
    }

    /// Dependency map for steps that have dependencies
    pub fn dependency_map(&self) -> BTreeMap<StepId, BTreeSet<StepId>> {
        self.content
            .steps
            .iter()
            .filter(|s| !s.depends_on.is_empty())
            .map(|s| (s.id, s.depends_on.clone()))
            .collect()
    }

    fn completed_ids(&self) -> BTreeSet<StepId> {
        self.content.steps.iter().filter(|s| s.completed).map(|s| s.id).collect()
    }

    /// Incomplete steps whose dependencies are all complete
    pub fn ready_steps(&self) -> Vec<StepId> {
        let done = self.completed_ids();
        self.content
            .steps
            .iter()
            .filter(|s| !s.completed && s.depends_on.iter().all(|d| done.contains(d)))
            .map(|s| s.id)
            .collect()
    }

    /// Incomplete steps waiting on at least one incomplete dependency
    pub fn blocked_steps(&self) -> Vec<StepId> {
        let done = self.completed_ids();
        self.content
            .steps
            .iter()
            .filter(|s| !s.completed && s.depends_on.iter().any(|d| !done.contains(d)))
            .map(|s| s.id)
            .collect()
    }

    /// Step ids with every step after its dependencies
    pub fn execution_order(&self) -> Vec<StepId> {
        topological_order(&self.content.steps).unwrap_or_else(|_| self.content.steps.iter().map(|s| s.id).collect())
    }

    /// One-line description used in listings and prompts
    pub fn summary(&self) -> String {
        let (completed, total) = self.progress();
        format!(
            "Plan '{}' v{} with {} steps ({} completed)",
            self.content.title, self.version, total, completed
        )
    }
}
