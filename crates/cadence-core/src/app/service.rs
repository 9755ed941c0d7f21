//! TaskService - タスク操作のユースケース
//!
//! 作成・依存の更新・完了・状態変更・削除を、検証と再発生成を挟んで実行する。
//! owner のスコープはここで確認する（他人のタスクは TaskNotFound）。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::dependency::DependencyValidator;
use crate::domain::task::dedup_ids;
use crate::domain::{
    EngineError, OwnerId, Priority, RecurrenceRule, StoreError, Task, TaskId, TaskStatus,
    Violation,
};
use crate::ports::{Clock, IdGenerator, TaskStore};

use super::recurrence::RecurrenceOrchestrator;

/// Input for [`TaskService::create_task`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner_id: OwnerId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub recurrence: RecurrenceRule,
    pub dependencies: Vec<TaskId>,
}

impl NewTask {
    pub fn new(owner_id: OwnerId, title: impl Into<String>) -> Self {
        Self {
            owner_id,
            title: title.into(),
            description: None,
            due_date: None,
            priority: Priority::default(),
            recurrence: RecurrenceRule::none(),
            dependencies: Vec::new(),
        }
    }

    pub fn due(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn recurring(mut self, recurrence: impl Into<RecurrenceRule>) -> Self {
        self.recurrence = recurrence.into();
        self
    }

    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}

/// Result of a completion.
///
/// 後続タスクの生成に失敗しても完了自体は取り消さない（`successor_error` に残す）。
#[derive(Debug)]
pub struct CompletionOutcome {
    pub task: Task,
    pub successor: Option<Task>,
    pub successor_error: Option<StoreError>,
}

impl CompletionOutcome {
    fn unchanged(task: Task) -> Self {
        Self {
            task,
            successor: None,
            successor_error: None,
        }
    }
}

/// Task use cases over a [`TaskStore`].
///
/// 構築は [`ServiceBuilder`](super::ServiceBuilder) から。
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    validator: DependencyValidator,
    orchestrator: RecurrenceOrchestrator,
}

impl TaskService {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        validator: DependencyValidator,
        orchestrator: RecurrenceOrchestrator,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            validator,
            orchestrator,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn validator(&self) -> &DependencyValidator {
        &self.validator
    }

    pub fn orchestrator(&self) -> &RecurrenceOrchestrator {
        &self.orchestrator
    }

    /// Create a task. Dependencies are checked before anything is written.
    pub async fn create_task(&self, draft: NewTask) -> Result<Task, EngineError> {
        let now = self.clock.now();
        let mut task = Task::new(self.ids.generate_task_id(), draft.owner_id, draft.title, now);
        task.description = draft.description;
        task.due_date = draft.due_date;
        task.priority = draft.priority;
        task.recurrence = draft.recurrence;

        let dependencies = dedup_ids(draft.dependencies);
        if !dependencies.is_empty() {
            self.check_dependencies(&task, &dependencies).await?;
            task.dependencies = dependencies;
        }

        self.store.save(task.clone()).await?;
        info!(task_id = %task.id, owner_id = %task.owner_id, "task created");
        Ok(task)
    }

    /// Replace the dependency list of an owned task.
    pub async fn update_dependencies(
        &self,
        owner: OwnerId,
        id: TaskId,
        dependencies: &[TaskId],
    ) -> Result<Task, EngineError> {
        let mut task = self.load_owned(owner, id).await?;
        let dependencies = dedup_ids(dependencies.iter().copied());

        self.check_dependencies(&task, &dependencies).await?;

        // 完了済みのタスクに後から依存を付けることはできない
        if task.status.is_completed() && !task.has_dependencies() && !dependencies.is_empty() {
            return Err(Violation::CompletedWithDependencies { task_id: id }.into());
        }

        task.replace_dependencies(&dependencies, self.clock.now());
        self.store.save(task.clone()).await?;
        debug!(task_id = %id, count = dependencies.len(), "dependencies updated");
        Ok(task)
    }

    /// Complete an owned task and schedule its next occurrence.
    ///
    /// すでに完了済みなら何もせずそのまま返す（後続も作らない）。
    /// 同時に呼ばれても完了への遷移として扱われるのは一回だけ。
    pub async fn complete_task(
        &self,
        owner: OwnerId,
        id: TaskId,
    ) -> Result<CompletionOutcome, EngineError> {
        let task = self.load_owned(owner, id).await?;
        if task.status.is_completed() {
            return Ok(CompletionOutcome::unchanged(task));
        }

        self.validator.can_complete(&task).await?.into_result()?;

        let Some(task) = self.store.complete_if_open(id, self.clock.now()).await? else {
            // 別の呼び出しが先に完了させた（または削除された）
            debug!(task_id = %id, "task already completed elsewhere");
            let current = self.load_owned(owner, id).await?;
            return Ok(CompletionOutcome::unchanged(current));
        };
        info!(task_id = %id, "task completed");

        let mut outcome = CompletionOutcome::unchanged(task);
        match self.orchestrator.on_task_completed(&outcome.task).await {
            Ok(successor) => outcome.successor = successor,
            Err(e) => {
                error!(task_id = %id, error = %e, "failed to create recurring successor");
                outcome.successor_error = Some(e);
            }
        }
        Ok(outcome)
    }

    /// Change status. Transitions into `Completed` go through [`complete_task`](Self::complete_task).
    pub async fn set_status(
        &self,
        owner: OwnerId,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<CompletionOutcome, EngineError> {
        if status.is_completed() {
            return self.complete_task(owner, id).await;
        }

        let mut task = self.load_owned(owner, id).await?;
        if task.status != status {
            task.set_status(status, self.clock.now());
            self.store.save(task.clone()).await?;
            debug!(task_id = %id, ?status, "status changed");
        }
        Ok(CompletionOutcome::unchanged(task))
    }

    /// Delete an owned task unless another task depends on it.
    pub async fn delete_task(&self, owner: OwnerId, id: TaskId) -> Result<(), EngineError> {
        let task = self.load_owned(owner, id).await?;
        self.validator.ensure_no_dependents(&task).await?.into_result()?;

        if !self.store.delete(id).await? {
            return Err(EngineError::TaskNotFound(id));
        }
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    async fn load_owned(&self, owner: OwnerId, id: TaskId) -> Result<Task, EngineError> {
        match self.store.find_by_id(id).await? {
            Some(task) if task.owner_id == owner && !task.is_deleted => Ok(task),
            _ => Err(EngineError::TaskNotFound(id)),
        }
    }

    /// Cycles first, then references.
    async fn check_dependencies(
        &self,
        task: &Task,
        dependencies: &[TaskId],
    ) -> Result<(), EngineError> {
        self.validator
            .validate_new_dependencies(task, dependencies)
            .await?
            .into_result()?;
        self.validator
            .ensure_references_exist(task.owner_id, dependencies)
            .await?
            .into_result()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ServiceBuilder;
    use crate::domain::{ErrorKind, Recurrence, TaskFilter, TaskRef};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    fn service_over(store: Arc<dyn TaskStore>) -> TaskService {
        ServiceBuilder::new()
            .store(store)
            .clock(Arc::new(FixedClock::new(at(2023, 5, 10))))
            .build()
            .unwrap()
    }

    fn service() -> (Arc<InMemoryTaskStore>, TaskService) {
        let store = Arc::new(InMemoryTaskStore::new());
        (store.clone(), service_over(store))
    }

    fn owner() -> OwnerId {
        OwnerId::from_ulid(Ulid::new())
    }

    fn violation_kind(err: EngineError) -> ErrorKind {
        err.kind().expect("violation")
    }

    #[tokio::test]
    async fn create_task_assigns_identity_and_timestamps() {
        let (store, svc) = service();
        let o = owner();

        let task = svc
            .create_task(NewTask::new(o, "write report").due(at(2023, 5, 12)))
            .await
            .unwrap();

        assert_eq!(task.owner_id, o);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.created_at, at(2023, 5, 10));
        assert_eq!(store.find_by_id(task.id).await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_dependencies() {
        let (store, svc) = service();
        let ghost = TaskId::from_ulid(Ulid::new());

        let err = svc
            .create_task(NewTask::new(owner(), "B").depends_on([ghost]))
            .await
            .unwrap_err();

        assert_eq!(violation_kind(err), ErrorKind::InvalidDependencyReference);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn update_dependencies_rejects_cycles() {
        let (_store, svc) = service();
        let o = owner();
        let a = svc.create_task(NewTask::new(o, "A")).await.unwrap();
        let b = svc
            .create_task(NewTask::new(o, "B").depends_on([a.id]))
            .await
            .unwrap();

        let err = svc.update_dependencies(o, a.id, &[b.id]).await.unwrap_err();
        match err {
            EngineError::Violation(Violation::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec![a.id, b.id, a.id]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let err = svc.update_dependencies(o, a.id, &[a.id]).await.unwrap_err();
        assert_eq!(violation_kind(err), ErrorKind::SelfDependency);
    }

    #[tokio::test]
    async fn update_dependencies_dedups_and_persists() {
        let (store, svc) = service();
        let o = owner();
        let a = svc.create_task(NewTask::new(o, "A")).await.unwrap();
        let b = svc.create_task(NewTask::new(o, "B")).await.unwrap();

        let updated = svc
            .update_dependencies(o, b.id, &[a.id, a.id])
            .await
            .unwrap();

        assert_eq!(updated.dependencies, vec![a.id]);
        let stored = store.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(stored.dependencies, vec![a.id]);
    }

    #[tokio::test]
    async fn completed_task_cannot_gain_dependencies() {
        let (_store, svc) = service();
        let o = owner();
        let a = svc.create_task(NewTask::new(o, "A")).await.unwrap();
        let b = svc.create_task(NewTask::new(o, "B")).await.unwrap();
        svc.complete_task(o, b.id).await.unwrap();

        let err = svc.update_dependencies(o, b.id, &[a.id]).await.unwrap_err();
        assert_eq!(violation_kind(err), ErrorKind::CompletedWithDependencies);
    }

    #[tokio::test]
    async fn other_owners_tasks_are_not_found() {
        let (_store, svc) = service();
        let a = svc.create_task(NewTask::new(owner(), "A")).await.unwrap();

        let err = svc.complete_task(owner(), a.id).await.unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound(id) if id == a.id));
    }

    #[tokio::test]
    async fn completion_is_gated_on_dependencies() {
        let (_store, svc) = service();
        let o = owner();
        let a = svc.create_task(NewTask::new(o, "A")).await.unwrap();
        let b = svc
            .create_task(NewTask::new(o, "B").depends_on([a.id]))
            .await
            .unwrap();

        let err = svc.complete_task(o, b.id).await.unwrap_err();
        match err {
            EngineError::Violation(Violation::IncompleteDependencies { dependencies }) => {
                assert_eq!(dependencies, vec![TaskRef::new(a.id, "A")]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        svc.complete_task(o, a.id).await.unwrap();
        let outcome = svc.complete_task(o, b.id).await.unwrap();
        assert_eq!(outcome.task.status, TaskStatus::Completed);
        assert_eq!(outcome.task.completed_at, Some(at(2023, 5, 10)));
    }

    #[tokio::test]
    async fn completing_a_recurring_task_schedules_the_next_one() {
        let (_store, svc) = service();
        let o = owner();
        let t = svc
            .create_task(
                NewTask::new(o, "standup")
                    .due(at(2023, 5, 10))
                    .recurring(Recurrence::daily(1)),
            )
            .await
            .unwrap();

        let outcome = svc.complete_task(o, t.id).await.unwrap();
        let next = outcome.successor.expect("successor");
        assert_eq!(next.due_date, Some(at(2023, 5, 11)));
        assert_eq!(next.parent_task_id, Some(t.id));

        // 二回目の完了は no-op
        let again = svc.complete_task(o, t.id).await.unwrap();
        assert!(again.successor.is_none());
    }

    #[tokio::test]
    async fn set_status_routes_completion() {
        let (_store, svc) = service();
        let o = owner();
        let t = svc
            .create_task(
                NewTask::new(o, "laundry")
                    .due(at(2023, 5, 10))
                    .recurring(Recurrence::weekly(1)),
            )
            .await
            .unwrap();

        let in_progress = svc
            .set_status(o, t.id, TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(in_progress.task.status, TaskStatus::InProgress);
        assert!(in_progress.successor.is_none());

        let done = svc
            .set_status(o, t.id, TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.successor.unwrap().due_date, Some(at(2023, 5, 17)));
    }

    #[tokio::test]
    async fn deletion_is_blocked_by_dependents() {
        let (store, svc) = service();
        let o = owner();
        let a = svc.create_task(NewTask::new(o, "A")).await.unwrap();
        let b = svc
            .create_task(NewTask::new(o, "B").depends_on([a.id]))
            .await
            .unwrap();

        let err = svc.delete_task(o, a.id).await.unwrap_err();
        assert_eq!(violation_kind(err), ErrorKind::HasDependents);

        svc.delete_task(o, b.id).await.unwrap();
        svc.delete_task(o, a.id).await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }

    /// Rejects every guarded insert.
    struct NoInsertStore(InMemoryTaskStore);

    #[async_trait]
    impl TaskStore for NoInsertStore {
        async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
            self.0.find_by_id(id).await
        }

        async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
            self.0.find(filter).await
        }

        async fn count_matching(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
            self.0.count_matching(filter).await
        }

        async fn save(&self, task: Task) -> Result<(), StoreError> {
            self.0.save(task).await
        }

        async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
            self.0.delete(id).await
        }

        async fn insert_unless_exists(
            &self,
            _task: Task,
            _guards: &[TaskFilter],
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("read-only replica".into()))
        }

        async fn complete_if_open(
            &self,
            id: TaskId,
            now: DateTime<Utc>,
        ) -> Result<Option<Task>, StoreError> {
            self.0.complete_if_open(id, now).await
        }
    }

    #[tokio::test]
    async fn successor_failure_keeps_the_completion() {
        let store = Arc::new(NoInsertStore(InMemoryTaskStore::new()));
        let svc = service_over(store.clone());
        let o = owner();
        let t = svc
            .create_task(
                NewTask::new(o, "backup")
                    .due(at(2023, 5, 10))
                    .recurring(Recurrence::monthly(1)),
            )
            .await
            .unwrap();

        let outcome = svc.complete_task(o, t.id).await.unwrap();

        assert!(outcome.successor.is_none());
        assert!(matches!(
            outcome.successor_error,
            Some(StoreError::Unavailable(_))
        ));
        let stored = store.find_by_id(t.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    /// Hands control back to the scheduler after every read, so concurrent
    /// callers interleave between loading a task and writing it.
    struct YieldingStore(InMemoryTaskStore);

    #[async_trait]
    impl TaskStore for YieldingStore {
        async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
            let found = self.0.find_by_id(id).await;
            tokio::task::yield_now().await;
            found
        }

        async fn find(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
            self.0.find(filter).await
        }

        async fn count_matching(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
            self.0.count_matching(filter).await
        }

        async fn save(&self, task: Task) -> Result<(), StoreError> {
            self.0.save(task).await
        }

        async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
            self.0.delete(id).await
        }

        async fn insert_unless_exists(
            &self,
            task: Task,
            guards: &[TaskFilter],
        ) -> Result<bool, StoreError> {
            self.0.insert_unless_exists(task, guards).await
        }

        async fn complete_if_open(
            &self,
            id: TaskId,
            now: DateTime<Utc>,
        ) -> Result<Option<Task>, StoreError> {
            self.0.complete_if_open(id, now).await
        }
    }

    /// Moves one second forward on every read.
    struct TickingClock(FixedClock);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let now = self.0.now();
            self.0.advance(chrono::Duration::seconds(1));
            now
        }
    }

    #[tokio::test]
    async fn concurrent_completion_is_a_single_transition() {
        let store = Arc::new(YieldingStore(InMemoryTaskStore::new()));
        let svc = ServiceBuilder::new()
            .store(store.clone())
            .clock(Arc::new(TickingClock(FixedClock::new(at(2023, 5, 10)))))
            .build()
            .unwrap();
        let o = owner();
        let t = svc
            .create_task(
                NewTask::new(o, "standup")
                    .due(at(2023, 5, 10))
                    .recurring(Recurrence::daily(1)),
            )
            .await
            .unwrap();

        let (first, second) = tokio::join!(svc.complete_task(o, t.id), svc.complete_task(o, t.id));
        let (first, second) = (first.unwrap(), second.unwrap());

        let scheduled = [&first, &second]
            .iter()
            .filter(|outcome| outcome.successor.is_some())
            .count();
        assert_eq!(scheduled, 1);

        let stored = store.find_by_id(t.id).await.unwrap().unwrap();
        assert!(stored.completed_at.is_some());
        assert_eq!(first.task.completed_at, stored.completed_at);
        assert_eq!(second.task.completed_at, stored.completed_at);

        let successors = store
            .count_matching(&TaskFilter::new().parent(t.id))
            .await
            .unwrap();
        assert_eq!(successors, 1);
    }
}
