//! In-memory task store.
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態全体を一つのロックで守る
//! - 依存グラフは派生インデックスとして save/delete のたびに同期する
//! - insert_unless_exists は guard 評価と挿入を同じロック内で行う
//! - complete_if_open も状態確認と更新を同じロック内で行う

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::dependency::DependencyGraph;
use crate::domain::{StoreError, Task, TaskFilter, TaskId, TaskStatus};
use crate::ports::TaskStore;

/// In-memory store state.
#[derive(Default)]
struct StoreState {
    /// All tasks (single source of truth).
    tasks: HashMap<TaskId, Task>,

    /// Derived from `Task::dependencies`.
    graph: DependencyGraph,
}

impl StoreState {
    fn upsert(&mut self, task: Task) {
        self.graph.set_dependencies(task.id, &task.dependencies);
        self.tasks.insert(task.id, task);
    }

    fn remove(&mut self, id: TaskId) -> bool {
        if self.tasks.remove(&id).is_none() {
            return false;
        }
        self.graph.remove_task(id);
        true
    }

    /// Matching tasks in ID (= creation) order.
    fn select(&self, filter: &TaskFilter) -> Vec<&Task> {
        // index で候補を絞ってから matches で確定させる
        let mut found: Vec<&Task> = if let Some(ids) = &filter.ids {
            ids.iter().filter_map(|id| self.tasks.get(id)).collect()
        } else if let Some(dep) = filter.depends_on {
            self.graph
                .dependents_of(dep)
                .iter()
                .filter_map(|id| self.tasks.get(id))
                .collect()
        } else {
            self.tasks.values().collect()
        };
        found.retain(|t| filter.matches(t));
        found.sort_by_key(|t| t.id);
        found.dedup_by_key(|t| t.id);
        found
    }

    fn any_match(&self, guards: &[TaskFilter]) -> bool {
        guards
            .iter()
            .any(|guard| self.tasks.values().any(|t| guard.matches(t)))
    }
}

/// TaskStore backed by a HashMap.
///
/// # 使用例
/// ```ignore
/// let store = InMemoryTaskStore::from_tasks(tasks);
/// let due = store.find(&TaskFilter::new().recurring_only()).await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. from a JSON dump.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut state = StoreState::default();
        for task in tasks {
            state.upsert(task);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// All tasks including deleted ones, in ID order.
    pub async fn snapshot(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// A dependency cycle among stored tasks, if one slipped in (e.g. via seeding).
    pub async fn dependency_cycle(&self) -> Option<Vec<TaskId>> {
        self.state.lock().await.graph.detect_cycle()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.select(filter).into_iter().cloned().collect())
    }

    async fn count_matching(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state.select(filter).len())
    }

    async fn save(&self, task: Task) -> Result<(), StoreError> {
        self.state.lock().await.upsert(task);
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.remove(id))
    }

    async fn insert_unless_exists(
        &self,
        task: Task,
        guards: &[TaskFilter],
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::Conflict(format!("task {} already exists", task.id)));
        }
        if state.any_match(guards) {
            return Ok(false);
        }
        state.upsert(task);
        Ok(true)
    }

    async fn complete_if_open(
        &self,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if task.is_deleted || !task.set_status(TaskStatus::Completed, now) {
            return Ok(None);
        }
        Ok(Some(task.clone()))
    }
}
