//! Recurrence rule: how often a task repeats.
//!
//! The rule is modeled as a tagged enum so that qualifiers only exist on the
//! variant that uses them (weekdays for `Weekly`, day-of-month for `Monthly`).
//!
//! On the wire the rule is a flat record
//! `{ "type", "interval", "end_date", "days_of_week", "day_of_month" }`.
//! Deserialization never fails on bad values; they degrade toward "no
//! recurrence" (see `RawRecurrence`).

use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repeat interval (every N days/weeks/months). Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval(NonZeroU32);

impl Interval {
    pub const ONE: Interval = Interval(NonZeroU32::MIN);

    /// Returns `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of weekdays, 0 = Sunday ... 6 = Saturday.
///
/// Stored as a bitmask so iteration is always in ascending order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    /// Builds a set from day numbers. Values outside 0..=6 are ignored.
    pub fn from_days<I: IntoIterator<Item = u32>>(days: I) -> Self {
        let mut bits = 0u8;
        for day in days {
            if day <= 6 {
                bits |= 1 << day;
            }
        }
        Self(bits)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, day: u32) -> bool {
        day <= 6 && self.0 & (1 << day) != 0
    }

    /// Smallest day in the set.
    pub fn first(self) -> Option<u32> {
        self.iter().next()
    }

    /// Smallest day strictly greater than `day`.
    pub fn first_after(self, day: u32) -> Option<u32> {
        self.iter().find(|&d| d > day)
    }

    pub fn iter(self) -> impl Iterator<Item = u32> {
        (0..=6).filter(move |&d| self.contains(d))
    }
}

/// Day of month (1..=31). Months shorter than this clamp to their last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayOfMonth(u32);

impl DayOfMonth {
    pub fn new(day: u32) -> Option<Self> {
        (1..=31).contains(&day).then_some(Self(day))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// The repeat pattern, with variant-specific qualifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Recurrence {
    #[default]
    None,
    Daily {
        interval: Interval,
    },
    Weekly {
        interval: Interval,
        weekdays: WeekdaySet,
    },
    Monthly {
        interval: Interval,
        day_of_month: Option<DayOfMonth>,
    },
}

impl Recurrence {
    pub fn daily(interval: u32) -> Self {
        Self::Daily {
            interval: Interval::new(interval).unwrap_or_default(),
        }
    }

    pub fn weekly(interval: u32) -> Self {
        Self::Weekly {
            interval: Interval::new(interval).unwrap_or_default(),
            weekdays: WeekdaySet::EMPTY,
        }
    }

    pub fn monthly(interval: u32) -> Self {
        Self::Monthly {
            interval: Interval::new(interval).unwrap_or_default(),
            day_of_month: None,
        }
    }

    pub fn kind(&self) -> RecurrenceKind {
        match self {
            Recurrence::None => RecurrenceKind::None,
            Recurrence::Daily { .. } => RecurrenceKind::Daily,
            Recurrence::Weekly { .. } => RecurrenceKind::Weekly,
            Recurrence::Monthly { .. } => RecurrenceKind::Monthly,
        }
    }

    /// Interval of the pattern; `None` reports the default of 1.
    pub fn interval(&self) -> Interval {
        match *self {
            Recurrence::None => Interval::ONE,
            Recurrence::Daily { interval }
            | Recurrence::Weekly { interval, .. }
            | Recurrence::Monthly { interval, .. } => interval,
        }
    }
}

/// Machine-readable recurrence type, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceKind {
    None,
    Daily,
    Weekly,
    Monthly,
}

/// A recurrence pattern plus its optional (exclusive) end date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRecurrence", into = "RawRecurrence")]
pub struct RecurrenceRule {
    pub pattern: Recurrence,

    /// Occurrences on or after this instant are not generated.
    pub end_date: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(pattern: Recurrence) -> Self {
        Self {
            pattern,
            end_date: None,
        }
    }

    pub fn until(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self.pattern, Recurrence::None)
    }
}

impl From<Recurrence> for RecurrenceRule {
    fn from(pattern: Recurrence) -> Self {
        Self::new(pattern)
    }
}

/// Flat wire form of [`RecurrenceRule`].
///
/// `type` is read as a free string so unknown values can fall back to `None`
/// instead of failing the whole task document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRecurrence {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    interval: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    days_of_week: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    day_of_month: Option<i64>,
}

impl From<RawRecurrence> for RecurrenceRule {
    fn from(raw: RawRecurrence) -> Self {
        let interval = raw
            .interval
            .and_then(|n| u32::try_from(n).ok())
            .and_then(Interval::new)
            .unwrap_or_default();

        let pattern = match raw.kind.as_deref() {
            Some("Daily") => Recurrence::Daily { interval },
            Some("Weekly") => Recurrence::Weekly {
                interval,
                weekdays: WeekdaySet::from_days(
                    raw.days_of_week
                        .iter()
                        .filter_map(|&d| u32::try_from(d).ok()),
                ),
            },
            Some("Monthly") => Recurrence::Monthly {
                interval,
                day_of_month: raw
                    .day_of_month
                    .and_then(|d| u32::try_from(d).ok())
                    .and_then(DayOfMonth::new),
            },
            _ => Recurrence::None,
        };

        Self {
            pattern,
            end_date: raw.end_date,
        }
    }
}

impl From<RecurrenceRule> for RawRecurrence {
    fn from(rule: RecurrenceRule) -> Self {
        let mut raw = RawRecurrence {
            kind: Some(format!("{:?}", rule.pattern.kind())),
            interval: Some(i64::from(rule.pattern.interval().get())),
            end_date: rule.end_date,
            ..Default::default()
        };
        match rule.pattern {
            Recurrence::Weekly { weekdays, .. } => {
                raw.days_of_week = weekdays.iter().map(i64::from).collect();
            }
            Recurrence::Monthly { day_of_month, .. } => {
                raw.day_of_month = day_of_month.map(|d| i64::from(d.get()));
            }
            Recurrence::None | Recurrence::Daily { .. } => {}
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn weekday_set_iterates_in_order_and_drops_out_of_range() {
        let set = WeekdaySet::from_days([5, 1, 9, 3]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(set.first(), Some(1));
        assert_eq!(set.first_after(3), Some(5));
        assert_eq!(set.first_after(5), None);
        assert!(!set.contains(9));
    }

    #[test]
    fn day_of_month_rejects_out_of_range() {
        assert!(DayOfMonth::new(0).is_none());
        assert!(DayOfMonth::new(32).is_none());
        assert_eq!(DayOfMonth::new(31).map(DayOfMonth::get), Some(31));
    }

    #[test]
    fn deserializes_weekly_with_qualifiers() {
        let rule: RecurrenceRule = serde_json::from_value(json!({
            "type": "Weekly",
            "interval": 2,
            "days_of_week": [1, 3],
            "day_of_month": 15,
        }))
        .unwrap();

        // day_of_month is not a Weekly qualifier and is dropped
        assert_eq!(
            rule.pattern,
            Recurrence::Weekly {
                interval: Interval::new(2).unwrap(),
                weekdays: WeekdaySet::from_days([1, 3]),
            }
        );
        assert_eq!(rule.end_date, None);
    }

    #[rstest]
    #[case::unknown_type(json!({"type": "Yearly", "interval": 1}))]
    #[case::lowercase_type(json!({"type": "daily", "interval": 1}))]
    #[case::missing_type(json!({"interval": 4}))]
    #[case::explicit_none(json!({"type": "None"}))]
    fn malformed_type_degrades_to_none(#[case] value: serde_json::Value) {
        let rule: RecurrenceRule = serde_json::from_value(value).unwrap();
        assert_eq!(rule.pattern, Recurrence::None);
        assert!(!rule.is_recurring());
    }

    #[rstest]
    #[case::zero(json!(0))]
    #[case::negative(json!(-3))]
    #[case::missing(json!(null))]
    fn bad_interval_defaults_to_one(#[case] interval: serde_json::Value) {
        let rule: RecurrenceRule =
            serde_json::from_value(json!({"type": "Daily", "interval": interval})).unwrap();
        assert_eq!(rule.pattern, Recurrence::Daily { interval: Interval::ONE });
    }

    #[test]
    fn serializes_flat_shape() {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rule = RecurrenceRule::new(Recurrence::Monthly {
            interval: Interval::new(3).unwrap(),
            day_of_month: DayOfMonth::new(31),
        })
        .until(end);

        let value = serde_json::to_value(rule).unwrap();
        assert_eq!(value["type"], "Monthly");
        assert_eq!(value["interval"], 3);
        assert_eq!(value["day_of_month"], 31);
        assert!(value.get("days_of_week").is_none());

        let back: RecurrenceRule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }
}
