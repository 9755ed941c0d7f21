//! Task record and its status/priority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OwnerId, TaskId};
use super::recurrence::RecurrenceRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Task status.
///
/// State transitions:
/// - Todo <-> InProgress
/// - Todo | InProgress -> Completed (gated on dependencies)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// A single task occurrence.
///
/// Design:
/// - Dependencies are held as IDs only; the store is the arena.
/// - `completed_at` is written once, on the transition into `Completed`.
/// - `parent_task_id` is only set on occurrences generated by recurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub recurrence: RecurrenceRule,

    /// Tasks this task waits for. Ordered, no duplicates.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A fresh `Todo` task with no dependencies and no recurrence.
    pub fn new(id: TaskId, owner_id: OwnerId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            title: title.into(),
            description: None,
            due_date: None,
            priority: Priority::default(),
            status: TaskStatus::Todo,
            recurrence: RecurrenceRule::none(),
            dependencies: Vec::new(),
            is_deleted: false,
            completed_at: None,
            parent_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_recurrence(mut self, recurrence: impl Into<RecurrenceRule>) -> Self {
        self.recurrence = recurrence.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dedup_ids(dependencies);
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Change status. Entering `Completed` stamps `completed_at` if it was never set.
    ///
    /// Returns `true` when this call is a genuine transition into `Completed`.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> bool {
        let entered_completed = status.is_completed() && !self.status.is_completed();
        self.status = status;
        if entered_completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        entered_completed
    }

    /// Replace the dependency list (deduplicated, order kept).
    pub fn replace_dependencies(&mut self, dependencies: &[TaskId], now: DateTime<Utc>) {
        self.dependencies = dedup_ids(dependencies.iter().copied());
        self.updated_at = now;
    }

    /// The next occurrence of this task: same content, fresh identity and lifecycle.
    pub fn successor(&self, id: TaskId, due_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            due_date: Some(due_date),
            status: TaskStatus::Todo,
            completed_at: None,
            parent_task_id: Some(self.id),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Deduplicate while keeping first-seen order.
pub fn dedup_ids(ids: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
