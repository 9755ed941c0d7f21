//! Engine configuration.
//!
//! Every field has a default, so a partial (or empty) JSON document is valid.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on store lookups during one dependency validation.
    /// `None` disables the bound.
    pub max_traversal_nodes: Option<usize>,

    /// How far back the batch sweep looks for completed recurring tasks.
    pub sweep_window_hours: u32,
}

impl EngineConfig {
    /// `None` if the window does not fit in a `TimeDelta`.
    pub fn sweep_window(&self) -> Option<TimeDelta> {
        TimeDelta::try_hours(i64::from(self.sweep_window_hours))
    }

    /// Lower bound of the sweep window ending at `now`.
    ///
    /// `None` when the window reaches past the earliest representable instant.
    pub fn sweep_since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.sweep_window()?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_traversal_nodes: Some(10_000),
            sweep_window_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let c = EngineConfig::default();
        assert_eq!(c.max_traversal_nodes, Some(10_000));
        assert_eq!(c.sweep_window(), Some(TimeDelta::days(1)));
    }

    #[test]
    fn oversized_window_has_no_lower_bound() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2023, 5, 10, 12, 0, 0).unwrap();
        let c: EngineConfig =
            serde_json::from_str(r#"{ "sweep_window_hours": 4294967295 }"#).unwrap();
        assert_eq!(c.sweep_window_hours, u32::MAX);
        assert_eq!(c.sweep_since(now), None);

        let day = EngineConfig::default();
        assert_eq!(day.sweep_since(now), Some(now - TimeDelta::days(1)));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{ "sweep_window_hours": 6 }"#).unwrap();
        assert_eq!(c.sweep_window_hours, 6);
        assert_eq!(c.max_traversal_nodes, Some(10_000));
    }

    #[test]
    fn traversal_bound_can_be_disabled() {
        let c: EngineConfig = serde_json::from_str(r#"{ "max_traversal_nodes": null }"#).unwrap();
        assert_eq!(c.max_traversal_nodes, None);
    }
}
