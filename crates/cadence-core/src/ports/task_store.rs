//! TaskStore port - タスクの正本（source of truth）
//!
//! TaskStore は以下を提供します：
//! - ID での取得、条件検索、件数取得
//! - 保存（upsert）と削除
//! - 重複チェック付きの挿入（後続タスク生成の冪等性）
//! - 未完了のときだけ完了にする条件付き更新
//!
//! owner によるスコープはストアではなく呼び出し側が `TaskFilter` で指定します。
//!
//! # 実装
//! - `impls::InMemoryTaskStore`（テスト・CLI 用）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{StoreError, Task, TaskFilter, TaskId};

/// TaskStore は依存グラフの arena でもある
///
/// # 設計原則
/// - 依存関係は ID で保持し、走査時は毎回 `find_by_id` で引き直す
/// - `insert_unless_exists` は guard の評価と挿入を一つの不可分操作として行う
/// - `complete_if_open` も同様に状態の確認と書き込みを不可分に行う
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    async fn count_matching(&self, filter: &TaskFilter) -> Result<usize, StoreError>;

    /// Insert or replace by `task.id`.
    async fn save(&self, task: Task) -> Result<(), StoreError>;

    /// Returns `false` if the task did not exist.
    async fn delete(&self, id: TaskId) -> Result<bool, StoreError>;

    /// Insert `task` only if no existing task matches any of `guards`.
    ///
    /// Returns `true` when the task was inserted. Guards are evaluated against
    /// the same state the insert is applied to, so two concurrent callers with
    /// the same guard cannot both succeed.
    async fn insert_unless_exists(&self, task: Task, guards: &[TaskFilter])
    -> Result<bool, StoreError>;

    /// Mark the task completed at `now` unless it already is.
    ///
    /// Returns the updated task when this call made the transition, `None`
    /// when the task is missing, deleted or already completed. Of two
    /// concurrent callers at most one gets `Some`.
    async fn complete_if_open(&self, id: TaskId, now: DateTime<Utc>)
    -> Result<Option<Task>, StoreError>;
}
