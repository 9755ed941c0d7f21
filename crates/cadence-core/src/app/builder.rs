//! ServiceBuilder - TaskService の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - ポートの既定実装（SystemClock, UlidGenerator）

use std::sync::Arc;

use crate::dependency::DependencyValidator;
use crate::domain::EngineConfig;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

use super::recurrence::RecurrenceOrchestrator;
use super::service::TaskService;

/// ServiceBuilder は TaskService を構築
///
/// # 使用例
/// ```ignore
/// let service = ServiceBuilder::new()
///     .store(Arc::new(InMemoryTaskStore::new()))
///     .config(config)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - store は必須（既定実装なし）
/// - clock / id_generator は省略時に SystemClock / UlidGenerator
/// - build() 時に設定値をチェックし、不正なら BuildError を返す
pub struct ServiceBuilder {
    store: Option<Arc<dyn TaskStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: EngineConfig,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no task store configured")]
    MissingStore,

    #[error("invalid engine config: {0}")]
    InvalidConfig(&'static str),
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            ids: None,
            config: EngineConfig::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - store が設定されているか
    /// - max_traversal_nodes が 0 でないか（0 だと依存を一切追加できない）
    /// - sweep_window_hours が 0 でないか
    /// - 現在時刻から sweep window を引いても表現可能な時刻に収まるか
    pub fn build(self) -> Result<TaskService, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        if self.config.max_traversal_nodes == Some(0) {
            return Err(BuildError::InvalidConfig("max_traversal_nodes must be positive"));
        }
        if self.config.sweep_window_hours == 0 {
            return Err(BuildError::InvalidConfig("sweep_window_hours must be positive"));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        if self.config.sweep_since(clock.now()).is_none() {
            return Err(BuildError::InvalidConfig("sweep_window_hours is out of range"));
        }
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())) as Arc<dyn IdGenerator>);

        let validator = DependencyValidator::with_config(store.clone(), self.config.clone());
        let orchestrator =
            RecurrenceOrchestrator::new(store.clone(), clock.clone(), ids.clone(), self.config);
        Ok(TaskService::new(store, clock, ids, validator, orchestrator))
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
