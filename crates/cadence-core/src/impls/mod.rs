//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: テスト・CLI 用の正本
//!
//! # 本番用実装
//! 本番用のストア（DB など）は別クレートに配置します。

pub mod inmem_store;

pub use self::inmem_store::InMemoryTaskStore;
