//! Next due date of a recurring task.
//!
//! Pure calendar arithmetic in UTC. The anchor's time of day is kept.
//!
//! Rules:
//! - Daily: anchor + interval days
//! - Weekly: anchor + 7 * interval days, or the next configured weekday
//!   (wrapping `interval` weeks ahead when the anchor is past the last one)
//! - Monthly: anchor + interval months, day clamped to the month's length
//! - A result on or after the rule's end date means "no more occurrences"

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

use crate::domain::{DayOfMonth, Interval, Recurrence, RecurrenceRule, Task, WeekdaySet};

/// Next occurrence after `task.due_date`, or `None` when the task does not
/// recur, has no due date, or the series has ended.
pub fn next_due_date(task: &Task) -> Option<DateTime<Utc>> {
    let anchor = task.due_date?;
    next_occurrence(&task.recurrence, anchor)
}

/// Same as [`next_due_date`] but with an explicit anchor.
pub fn next_occurrence(rule: &RecurrenceRule, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let candidate = match rule.pattern {
        Recurrence::None => return None,
        Recurrence::Daily { interval } => {
            anchor.checked_add_days(Days::new(u64::from(interval.get())))
        }
        Recurrence::Weekly { interval, weekdays } => weekly(anchor, interval, weekdays),
        Recurrence::Monthly {
            interval,
            day_of_month,
        } => monthly(anchor, interval, day_of_month),
    }?;

    if let Some(end) = rule.end_date
        && candidate >= end
    {
        return None;
    }
    Some(candidate)
}

fn weekly(anchor: DateTime<Utc>, interval: Interval, weekdays: WeekdaySet) -> Option<DateTime<Utc>> {
    let week = 7 * u64::from(interval.get());

    let Some(first) = weekdays.first() else {
        return anchor.checked_add_days(Days::new(week));
    };

    let today = anchor.weekday().num_days_from_sunday();
    let days = match weekdays.first_after(today) {
        Some(next) => u64::from(next - today),
        // 最後の曜日を過ぎていたら interval 週先の最初の曜日へ
        None => week - u64::from(today) + u64::from(first),
    };
    anchor.checked_add_days(Days::new(days))
}

fn monthly(
    anchor: DateTime<Utc>,
    interval: Interval,
    day_of_month: Option<DayOfMonth>,
) -> Option<DateTime<Utc>> {
    // checked_add_months already clamps (Jan 31 + 1 month = Feb 28/29)
    let shifted = anchor.checked_add_months(Months::new(interval.get()))?;

    let Some(day) = day_of_month else {
        return Some(shifted);
    };

    let last = days_in_month(shifted.year(), shifted.month())?;
    shifted.with_day(day.get().min(last))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}
