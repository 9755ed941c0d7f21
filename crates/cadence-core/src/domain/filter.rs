//! TaskFilter - TaskStore に渡す検索条件
//!
//! すべての条件は AND で結合されます。未指定の条件は「何でもよい」。
//! 論理削除されたタスクは `include_deleted()` を指定しない限り対象外です。

use std::ops::Range;

use chrono::{DateTime, Utc};

use super::ids::{OwnerId, TaskId};
use super::task::{Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub ids: Option<Vec<TaskId>>,
    pub owner_id: Option<OwnerId>,
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    /// true なら status != Completed のみ
    pub not_completed: bool,
    /// Half-open `[start, end)` window on `due_date`.
    pub due_within: Option<Range<DateTime<Utc>>>,
    pub completed_since: Option<DateTime<Utc>>,
    pub recurring_only: bool,
    /// Tasks whose dependency list contains this ID.
    pub depends_on: Option<TaskId>,
    pub parent_task_id: Option<TaskId>,
    pub exclude_id: Option<TaskId>,
    pub include_deleted: bool,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn not_completed(mut self) -> Self {
        self.not_completed = true;
        self
    }

    pub fn due_within(mut self, window: Range<DateTime<Utc>>) -> Self {
        self.due_within = Some(window);
        self
    }

    pub fn completed_since(mut self, since: DateTime<Utc>) -> Self {
        self.completed_since = Some(since);
        self
    }

    pub fn recurring_only(mut self) -> Self {
        self.recurring_only = true;
        self
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.depends_on = Some(task_id);
        self
    }

    pub fn parent(mut self, task_id: TaskId) -> Self {
        self.parent_task_id = Some(task_id);
        self
    }

    pub fn excluding(mut self, task_id: TaskId) -> Self {
        self.exclude_id = Some(task_id);
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Evaluate the filter against one record.
    ///
    /// Store implementations may push conditions down to an index, but the
    /// result must agree with this predicate.
    pub fn matches(&self, task: &Task) -> bool {
        if task.is_deleted && !self.include_deleted {
            return false;
        }
        if let Some(ids) = &self.ids
            && !ids.contains(&task.id)
        {
            return false;
        }
        if self.owner_id.is_some_and(|owner| owner != task.owner_id) {
            return false;
        }
        if self.title.as_deref().is_some_and(|title| title != task.title) {
            return false;
        }
        if self.status.is_some_and(|status| status != task.status) {
            return false;
        }
        if self.not_completed && task.status.is_completed() {
            return false;
        }
        if let Some(window) = &self.due_within {
            match task.due_date {
                Some(due) if window.contains(&due) => {}
                _ => return false,
            }
        }
        if let Some(since) = self.completed_since {
            match task.completed_at {
                Some(at) if at >= since => {}
                _ => return false,
            }
        }
        if self.recurring_only && !task.recurrence.is_recurring() {
            return false;
        }
        if let Some(dep) = self.depends_on
            && !task.dependencies.contains(&dep)
        {
            return false;
        }
        if self.parent_task_id.is_some() && self.parent_task_id != task.parent_task_id {
            return false;
        }
        if self.exclude_id == Some(task.id) {
            return false;
        }
        true
    }
}
