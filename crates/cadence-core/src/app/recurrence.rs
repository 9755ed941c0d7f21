//! RecurrenceOrchestrator - 完了した繰り返しタスクの次回分を生成
//!
//! # フロー（1 タスク）
//! 1. 繰り返し設定がなければ何もしない
//! 2. next_due_date で次回の期日を計算（系列が終わっていれば何もしない）
//! 3. 同じ owner・同じタイトル・同じ日（UTC）の期日を持つタスクがあれば何もしない
//! 4. 後続タスクを作って insert_unless_exists で保存
//!
//! # 冪等性
//! 3 の事前チェックに加えて、4 では同じ条件と「parent_task_id == 元タスク」を
//! guard としてストアに渡す。同じ完了に対して何回呼ばれても後続は高々 1 件。

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::{EngineConfig, StoreError, Task, TaskFilter, TaskId, TaskStatus};
use crate::ports::{Clock, IdGenerator, TaskStore};
use crate::schedule::next_due_date;

/// Result of one batch sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Completed recurring tasks found in the window.
    pub scanned: usize,
    pub created: Vec<Task>,
    /// Tasks that needed no successor (duplicate, or the series ended).
    pub suppressed: usize,
    pub failures: Vec<SweepFailure>,
    /// Stopped early by the shutdown signal.
    pub interrupted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub task_id: TaskId,
    pub error: String,
}

/// Successor generation for recurring tasks.
pub struct RecurrenceOrchestrator {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
}

impl RecurrenceOrchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            config,
        }
    }

    /// Create the next occurrence of a just-completed task.
    ///
    /// 呼び出し側は Completed への遷移 1 回につき 1 回だけ呼ぶ。
    /// 生成しなかった場合は `Ok(None)`。
    pub async fn on_task_completed(&self, task: &Task) -> Result<Option<Task>, StoreError> {
        if !task.recurrence.is_recurring() {
            return Ok(None);
        }
        let Some(next_due) = next_due_date(task) else {
            debug!(task_id = %task.id, "recurrence has no further occurrence");
            return Ok(None);
        };

        let duplicate = duplicate_filter(task, next_due);
        if self.store.count_matching(&duplicate).await? > 0 {
            info!(task_id = %task.id, %next_due, "successor already exists");
            return Ok(None);
        }

        let successor = task.successor(self.ids.generate_task_id(), next_due, self.clock.now());
        let guards = [duplicate, TaskFilter::new().parent(task.id)];
        if !self
            .store
            .insert_unless_exists(successor.clone(), &guards)
            .await?
        {
            info!(task_id = %task.id, %next_due, "successor created concurrently");
            return Ok(None);
        }

        info!(
            task_id = %task.id,
            successor_id = %successor.id,
            %next_due,
            "recurring task scheduled"
        );
        Ok(Some(successor))
    }

    /// Batch variant over tasks completed within the configured window.
    pub async fn sweep(&self) -> Result<SweepReport, StoreError> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.sweep_with_shutdown(shutdown_rx).await
    }

    /// Like [`sweep`](Self::sweep), stopping before the next task once
    /// `shutdown` turns `true`.
    ///
    /// 個別タスクの失敗はログに残して続行する。一覧の取得に失敗したときだけ Err。
    pub async fn sweep_with_shutdown(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let Some(since) = self.config.sweep_since(now) else {
            return Err(StoreError::Other(format!(
                "sweep window of {}h reaches before the earliest representable time",
                self.config.sweep_window_hours
            )));
        };
        let filter = TaskFilter::new()
            .status(TaskStatus::Completed)
            .recurring_only()
            .completed_since(since);
        let completed = self.store.find(&filter).await?;

        let mut report = SweepReport {
            scanned: completed.len(),
            ..SweepReport::default()
        };
        info!(scanned = report.scanned, %since, "recurrence sweep started");

        for task in &completed {
            if *shutdown.borrow() {
                warn!(
                    remaining = report.scanned - report.created.len() - report.suppressed - report.failures.len(),
                    "recurrence sweep interrupted"
                );
                report.interrupted = true;
                break;
            }

            match self.on_task_completed(task).await {
                Ok(Some(successor)) => report.created.push(successor),
                Ok(None) => report.suppressed += 1,
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "failed to create successor");
                    report.failures.push(SweepFailure {
                        task_id: task.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = report.created.len(),
            suppressed = report.suppressed,
            failed = report.failures.len(),
            "recurrence sweep finished"
        );
        Ok(report)
    }
}

/// Same owner, same title, due on the same UTC day, not the task itself.
fn duplicate_filter(task: &Task, next_due: DateTime<Utc>) -> TaskFilter {
    TaskFilter::new()
        .owner(task.owner_id)
        .title(task.title.clone())
        .due_within(utc_day(next_due))
        .excluding(task.id)
}

/// `[00:00, 翌日 00:00)` in UTC.
fn utc_day(at: DateTime<Utc>) -> Range<DateTime<Utc>> {
    let start = at.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    start..end
}
