//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ServiceBuilder**: TaskService の構築とワイヤリング
//! - **TaskService**: 作成・依存更新・完了・状態変更・削除
//! - **RecurrenceOrchestrator**: 繰り返しタスクの後続生成（単発・バッチ）

pub mod builder;
pub mod recurrence;
pub mod service;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ServiceBuilder};
pub use self::recurrence::{RecurrenceOrchestrator, SweepFailure, SweepReport};
pub use self::service::{CompletionOutcome, NewTask, TaskService};
