// ── API-to-domain type conversions ──
//
// Bridges raw `sprig_api` records into `sprig_core::model` types.

use sprig_api::SampleRecord;

use crate::model::Sample;

impl From<SampleRecord> for Sample {
    fn from(r: SampleRecord) -> Self {
        Self {
            device_id: r.device_id,
            temperature: r.temp,
            soil_moisture: r.moisture_dirt,
            air_moisture: r.moisture_air,
            raw_soil: r.raw_soil,
            captured_at: r.created_at,
            remote_id: r.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn record_fields_map_onto_sample() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).single();
        let Some(at) = at else {
            panic!("valid timestamp");
        };
        let sample = Sample::from(SampleRecord {
            id: Some(11),
            device_id: "ESP32-TEST".into(),
            temp: 23.46,
            moisture_dirt: 40.0,
            moisture_air: 61.0,
            raw_soil: None,
            created_at: at,
        });
        assert_eq!(sample.device_id, "ESP32-TEST");
        assert!((sample.air_moisture - 61.0).abs() < f64::EPSILON);
        assert!((sample.soil_moisture - 40.0).abs() < f64::EPSILON);
        assert_eq!(sample.remote_id, Some(11));
        assert_eq!(sample.captured_at, at);
    }
}
