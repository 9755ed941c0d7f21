//! Dependency - タスク間の依存関係
//!
//! - `graph`: 正/逆方向の隣接リスト（ストア内部のインデックス）
//! - `validator`: 循環・完了可否・削除可否の判定（TaskStore 越し）

pub mod graph;
pub mod validator;

pub use self::graph::DependencyGraph;
pub use self::validator::DependencyValidator;
