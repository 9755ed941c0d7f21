//! DependencyValidator - 依存関係の検証
//!
//! - 依存の追加時: 自己依存・循環依存・参照先の存在チェック
//! - 完了時: 依存先がすべて Completed かどうか
//! - 削除時: このタスクに依存しているタスクがないか
//!
//! 走査は保存済みのグラフに対して行い、ノードごとに `TaskStore::find_by_id`
//! で引き直す。結果はキャッシュしない（判定は常にその時点の状態で行う）。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::task::dedup_ids;
use crate::domain::{
    EngineConfig, OwnerId, StoreError, Task, TaskFilter, TaskId, TaskRef, Verdict, Violation,
};
use crate::ports::TaskStore;

/// Validator over the stored dependency graph.
///
/// # 使用例
/// ```ignore
/// let validator = DependencyValidator::new(store.clone());
/// match validator.validate_new_dependencies(&task, &deps).await? {
///     Verdict::Valid => { /* persist */ }
///     Verdict::Invalid(violation) => return Err(violation.into()),
/// }
/// ```
pub struct DependencyValidator {
    store: Arc<dyn TaskStore>,
    config: EngineConfig,
}

/// One level of the iterative DFS.
struct Frame {
    dependencies: Vec<TaskId>,
    next: usize,
}

/// Outcome of one traversal step.
enum Step {
    Continue,
    Cycle(Vec<TaskId>),
    TooLarge(usize),
}

/// Per-validation traversal state.
struct Traversal {
    root: TaskId,
    limit: Option<usize>,
    lookups: usize,
    visited: HashSet<TaskId>,
    path: Vec<TaskId>,
    stack: Vec<Frame>,
}

impl Traversal {
    fn new(root: TaskId, limit: Option<usize>) -> Self {
        Self {
            root,
            limit,
            lookups: 0,
            visited: HashSet::new(),
            path: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Visited は候補ごとにリセットする（lookups は検証全体で数える）
    fn reset(&mut self) {
        self.visited.clear();
        self.path.clear();
        self.path.push(self.root);
        self.stack.clear();
    }

    async fn enter(&mut self, store: &dyn TaskStore, id: TaskId) -> Result<Step, StoreError> {
        if id == self.root {
            let mut cycle = self.path.clone();
            cycle.push(self.root);
            return Ok(Step::Cycle(cycle));
        }
        if !self.visited.insert(id) {
            return Ok(Step::Continue);
        }
        if let Some(limit) = self.limit
            && self.lookups >= limit
        {
            return Ok(Step::TooLarge(limit));
        }
        self.lookups += 1;

        // 存在しない / 削除済みのタスクは依存なしとして扱う
        let dependencies = match store.find_by_id(id).await? {
            Some(task) if !task.is_deleted => task.dependencies,
            _ => Vec::new(),
        };
        self.path.push(id);
        self.stack.push(Frame {
            dependencies,
            next: 0,
        });
        Ok(Step::Continue)
    }

    /// DFS from `candidate`; stops at the first path back to the root.
    async fn search(
        &mut self,
        store: &dyn TaskStore,
        candidate: TaskId,
    ) -> Result<Step, StoreError> {
        self.reset();
        let step = self.enter(store, candidate).await?;
        if !matches!(step, Step::Continue) {
            return Ok(step);
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(Step::Continue);
            };
            let Some(&next) = frame.dependencies.get(frame.next) else {
                self.stack.pop();
                self.path.pop();
                continue;
            };
            frame.next += 1;

            let step = self.enter(store, next).await?;
            if !matches!(step, Step::Continue) {
                return Ok(step);
            }
        }
    }
}

impl DependencyValidator {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn TaskStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Check a full replacement dependency list for `task`.
    ///
    /// - 自分自身を含む → `SelfDependency`（cycle は `[task]`）
    /// - 候補から保存済みの依存をたどって `task` に戻る → `CircularDependency`
    ///   （cycle は `[task, candidate, ..., task]`）
    /// - 走査数が `max_traversal_nodes` を超える → `DependencyGraphTooLarge`
    pub async fn validate_new_dependencies(
        &self,
        task: &Task,
        candidates: &[TaskId],
    ) -> Result<Verdict, StoreError> {
        if candidates.contains(&task.id) {
            debug!(task_id = %task.id, "self dependency rejected");
            return Ok(Violation::SelfDependency {
                cycle: vec![task.id],
            }
            .into());
        }

        let mut traversal = Traversal::new(task.id, self.config.max_traversal_nodes);
        for &candidate in &dedup_ids(candidates.iter().copied()) {
            match traversal.search(self.store.as_ref(), candidate).await? {
                Step::Continue => {}
                Step::Cycle(cycle) => {
                    debug!(task_id = %task.id, %candidate, len = cycle.len(), "dependency cycle found");
                    return Ok(Violation::CircularDependency { cycle }.into());
                }
                Step::TooLarge(limit) => {
                    warn!(task_id = %task.id, limit, "dependency traversal limit exceeded");
                    return Ok(Violation::DependencyGraphTooLarge { limit }.into());
                }
            }
        }

        debug!(
            task_id = %task.id,
            candidates = candidates.len(),
            lookups = traversal.lookups,
            "dependencies valid"
        );
        Ok(Verdict::Valid)
    }

    /// Completion gate: every live dependency must be `Completed`.
    ///
    /// 存在しない依存・削除済みの依存はブロックしない。
    pub async fn can_complete(&self, task: &Task) -> Result<Verdict, StoreError> {
        if !task.has_dependencies() {
            return Ok(Verdict::Valid);
        }

        let filter = TaskFilter::new()
            .ids(task.dependencies.iter().copied())
            .not_completed();
        let incomplete: HashMap<TaskId, Task> = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        if incomplete.is_empty() {
            return Ok(Verdict::Valid);
        }

        // task.dependencies の順序で返す
        let dependencies: Vec<TaskRef> = task
            .dependencies
            .iter()
            .filter_map(|id| incomplete.get(id))
            .map(|t| TaskRef::new(t.id, t.title.clone()))
            .collect();

        debug!(task_id = %task.id, blocking = dependencies.len(), "completion blocked");
        Ok(Violation::IncompleteDependencies { dependencies }.into())
    }

    /// Deletion guard: no live task of the same owner may depend on `task`.
    pub async fn ensure_no_dependents(&self, task: &Task) -> Result<Verdict, StoreError> {
        let filter = TaskFilter::new()
            .owner(task.owner_id)
            .depends_on(task.id)
            .excluding(task.id);
        let dependents: Vec<TaskRef> = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|t| TaskRef::new(t.id, t.title))
            .collect();

        if dependents.is_empty() {
            Ok(Verdict::Valid)
        } else {
            Ok(Violation::HasDependents { dependents }.into())
        }
    }

    /// Every candidate must be a live task owned by `owner`.
    pub async fn ensure_references_exist(
        &self,
        owner: OwnerId,
        candidates: &[TaskId],
    ) -> Result<Verdict, StoreError> {
        let candidates = dedup_ids(candidates.iter().copied());
        if candidates.is_empty() {
            return Ok(Verdict::Valid);
        }

        let filter = TaskFilter::new()
            .ids(candidates.iter().copied())
            .owner(owner);
        if self.store.count_matching(&filter).await? == candidates.len() {
            return Ok(Verdict::Valid);
        }

        let found: HashSet<TaskId> = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let missing: Vec<TaskId> = candidates
            .into_iter()
            .filter(|id| !found.contains(id))
            .collect();

        debug!(%owner, missing = missing.len(), "dependency references rejected");
        Ok(Violation::InvalidDependencyReference { missing }.into())
    }

    /// Resolve a cycle path to titles for display (see `render_cycle`).
    ///
    /// IDs that no longer resolve keep an empty title.
    pub async fn describe_cycle(&self, cycle: &[TaskId]) -> Result<Vec<TaskRef>, StoreError> {
        let filter = TaskFilter::new()
            .ids(cycle.iter().copied())
            .include_deleted();
        let titles: HashMap<TaskId, String> = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|t| (t.id, t.title))
            .collect();

        Ok(cycle
            .iter()
            .map(|id| TaskRef::new(*id, titles.get(id).cloned().unwrap_or_default()))
            .collect())
    }
}
