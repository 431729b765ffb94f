//! Domain types for the planning core
//!
//! Core domain types: Message, ConversationState, Plan, SessionSnapshot.
//! Plans are edited through `apply_edit`, which never mutates its input.

mod graph;
mod message;
mod plan;
mod snapshot;

pub use graph::{topological_order, validate_dependency_graph};
pub use message::{ConversationState, Message, Role};
pub use plan::{
    DEFAULT_PLAN_TITLE, EditOp, HistoryEntry, Milestone, Plan, PlanContent, PlanEdit, PlanMetadata, PlanStep, StepChange,
    StepId, apply_edit, diff_contents, fork_plan,
};
pub use snapshot::{SessionId, SessionSnapshot, generate_session_id};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
