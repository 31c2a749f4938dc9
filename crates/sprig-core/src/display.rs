// ── Presentation formatting ──
//
// The only place readings become strings. Unknown values render as "--".

use chrono::{DateTime, Utc};

use crate::model::LiveReadings;

pub const UNKNOWN: &str = "--";

// `format!` rounds exact halves to even. Readings round halves away from
// zero, so values are rounded with `f64::round` before formatting.

/// `"23.5°C"`, or `"--"` when unknown.
pub fn temperature(value: Option<f64>) -> String {
    value.map_or_else(
        || UNKNOWN.to_owned(),
        |v| format!("{:.1}°C", (v * 10.0).round() / 10.0),
    )
}

/// `"61%"`, or `"--"` when unknown.
pub fn humidity(value: Option<f64>) -> String {
    value.map_or_else(|| UNKNOWN.to_owned(), |v| format!("{:.0}%", v.round()))
}

pub fn observed_at(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || UNKNOWN.to_owned(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

/// Display strings for a set of readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingLabels {
    pub temperature: String,
    pub humidity: String,
}

impl From<&LiveReadings> for ReadingLabels {
    fn from(r: &LiveReadings) -> Self {
        Self {
            temperature: temperature(r.temperature),
            humidity: humidity(r.humidity),
        }
    }
}
