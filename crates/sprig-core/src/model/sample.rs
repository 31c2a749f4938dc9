// ── Telemetry sample ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading reported by a device. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub device_id: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Soil moisture percentage.
    pub soil_moisture: f64,
    /// Air humidity percentage.
    pub air_moisture: f64,
    pub raw_soil: Option<f64>,
    pub captured_at: DateTime<Utc>,
    /// Row id on the telemetry service, when it reports one.
    pub remote_id: Option<i64>,
}
