//! Compact repeating-interval notation: `R/P<n><unit>`.
//!
//! - `D` = Daily, `W` = Weekly, `M` = Monthly
//! - weekday / day-of-month qualifiers and the end date are not representable
//!   and are dropped by `encode`
//! - `decode` never fails; anything it does not understand is "no recurrence"

use crate::domain::{Interval, Recurrence, RecurrenceRule, WeekdaySet};

const PREFIX: &str = "R/P";

/// Encode the pattern, or `None` for a non-recurring rule.
pub fn encode(rule: &RecurrenceRule) -> Option<String> {
    let (interval, unit) = match rule.pattern {
        Recurrence::None => return None,
        Recurrence::Daily { interval } => (interval, 'D'),
        Recurrence::Weekly { interval, .. } => (interval, 'W'),
        Recurrence::Monthly { interval, .. } => (interval, 'M'),
    };
    Some(format!("{PREFIX}{interval}{unit}"))
}

/// Decode `R/P<n><unit>`. Malformed input yields a non-recurring rule.
pub fn decode(s: &str) -> RecurrenceRule {
    parse(s).map(RecurrenceRule::new).unwrap_or_default()
}

fn parse(s: &str) -> Option<Recurrence> {
    let body = s.strip_prefix(PREFIX)?;
    let unit = body.chars().last()?;
    let digits = &body[..body.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let interval = Interval::new(digits.parse().ok()?)?;

    match unit {
        'D' => Some(Recurrence::Daily { interval }),
        'W' => Some(Recurrence::Weekly {
            interval,
            weekdays: WeekdaySet::EMPTY,
        }),
        'M' => Some(Recurrence::Monthly {
            interval,
            day_of_month: None,
        }),
        _ => None,
    }
}
