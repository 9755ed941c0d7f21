//! Domain model (IDs, tasks, recurrence rules, filters, errors, config).

pub mod config;
pub mod errors;
pub mod filter;
pub mod ids;
pub mod recurrence;
pub mod task;

pub use config::EngineConfig;
pub use errors::{EngineError, ErrorKind, StoreError, TaskRef, Verdict, Violation, render_cycle};
pub use filter::TaskFilter;
pub use ids::{OwnerId, TaskId};
pub use recurrence::{
    DayOfMonth, Interval, Recurrence, RecurrenceKind, RecurrenceRule, WeekdaySet,
};
pub use task::{Priority, Task, TaskStatus};
