//! Errors - エラー型と分類
//!
//! - `Violation`: 入力の問題（循環依存、未完了の依存など）。呼び出し側で回復可能。
//! - `StoreError`: TaskStore の I/O 障害。
//! - `EngineError`: 上記をまとめた、サービス層の戻り値。
//!
//! Violation は `Verdict::Invalid` として値で返します。ストア障害とは分けて扱う。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::TaskId;

/// ErrorKind は呼び出し側（API 層）向けの機械可読な分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SelfDependency,
    CircularDependency,
    IncompleteDependencies,
    HasDependents,
    InvalidDependencyReference,
    CompletedWithDependencies,
    DependencyGraphTooLarge,
}

impl ErrorKind {
    /// snake_case code for API payloads.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::SelfDependency => "self_dependency",
            ErrorKind::CircularDependency => "circular_dependency",
            ErrorKind::IncompleteDependencies => "incomplete_dependencies",
            ErrorKind::HasDependents => "has_dependents",
            ErrorKind::InvalidDependencyReference => "invalid_dependencies",
            ErrorKind::CompletedWithDependencies => "completed_with_dependencies",
            ErrorKind::DependencyGraphTooLarge => "dependency_graph_too_large",
        }
    }
}

/// A task reference for user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: TaskId,
    pub title: String,
}

impl TaskRef {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// A rejected mutation or completion, with enough detail to render a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("a task cannot depend on itself ({})", join_ids(.cycle))]
    SelfDependency { cycle: Vec<TaskId> },

    #[error("circular dependency detected: {}", join_ids(.cycle))]
    CircularDependency { cycle: Vec<TaskId> },

    #[error("cannot complete task: {} dependencies are not completed", .dependencies.len())]
    IncompleteDependencies { dependencies: Vec<TaskRef> },

    #[error("cannot delete task: {} other tasks depend on it", .dependents.len())]
    HasDependents { dependents: Vec<TaskRef> },

    #[error("dependencies not found or not owned by the caller: {}", join_ids(.missing))]
    InvalidDependencyReference { missing: Vec<TaskId> },

    #[error("cannot add dependencies to an already completed task ({task_id})")]
    CompletedWithDependencies { task_id: TaskId },

    #[error("dependency graph exceeds the traversal limit of {limit} tasks")]
    DependencyGraphTooLarge { limit: usize },
}

impl Violation {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Violation::SelfDependency { .. } => ErrorKind::SelfDependency,
            Violation::CircularDependency { .. } => ErrorKind::CircularDependency,
            Violation::IncompleteDependencies { .. } => ErrorKind::IncompleteDependencies,
            Violation::HasDependents { .. } => ErrorKind::HasDependents,
            Violation::InvalidDependencyReference { .. } => ErrorKind::InvalidDependencyReference,
            Violation::CompletedWithDependencies { .. } => ErrorKind::CompletedWithDependencies,
            Violation::DependencyGraphTooLarge { .. } => ErrorKind::DependencyGraphTooLarge,
        }
    }

    /// The cycle path for self/circular dependency violations.
    pub fn cycle(&self) -> Option<&[TaskId]> {
        match self {
            Violation::SelfDependency { cycle } | Violation::CircularDependency { cycle } => {
                Some(cycle)
            }
            _ => None,
        }
    }
}

/// Outcome of a validation: `Valid`, or the reason it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Violation),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Valid => None,
            Verdict::Invalid(v) => Some(v),
        }
    }

    pub fn into_result(self) -> Result<(), Violation> {
        match self {
            Verdict::Valid => Ok(()),
            Verdict::Invalid(v) => Err(v),
        }
    }
}

impl From<Violation> for Verdict {
    fn from(v: Violation) -> Self {
        Verdict::Invalid(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("task store conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Violation(#[from] Violation),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

impl EngineError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::Violation(v) => Some(v.kind()),
            _ => None,
        }
    }
}

/// Render a resolved cycle as `A → B → A`.
///
/// Titles are used when present; empty titles fall back to the ID.
pub fn render_cycle(cycle: &[TaskRef]) -> String {
    cycle
        .iter()
        .map(|r| {
            if r.title.is_empty() {
                r.id.to_string()
            } else {
                r.title.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" → ")
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ")
}
