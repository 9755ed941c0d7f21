//! cadence-core
//!
//! Dependency and recurrence engine for a personal task tracker.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, recurrence, filter, errors, config）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator）
//! - **schedule**: 次回期日の計算と `R/P<n><unit>` 形式の変換（純粋関数）
//! - **dependency**: 依存グラフのインデックスと DependencyValidator
//! - **app**: アプリケーションロジック（TaskService, RecurrenceOrchestrator, builder）
//! - **impls**: 実装（InMemoryTaskStore など開発用）

pub mod app;
pub mod dependency;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod schedule;
