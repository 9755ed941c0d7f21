//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! エンジン本体は永続化・時刻・ID 採番の実装を知りません。
//!
//! # 設計原則
//! - TaskStore が source of truth（正本）。依存グラフもここから引く
//! - 時刻は Clock から取る（テストで固定できるように）

pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
