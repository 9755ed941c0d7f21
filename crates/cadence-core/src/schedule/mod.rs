//! Schedule: pure recurrence arithmetic and its string form.

pub mod interval;
pub mod next_due;

pub use self::interval::{decode, encode};
pub use self::next_due::{next_due_date, next_occurrence};
