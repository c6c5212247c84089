use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::VehicleId;
use crate::position::PositionSample;

/// One uplinked fix. Serializes to the backend's wire shape
/// `{latitude, longitude, speed, vehicle_id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    /// m/s, zero when the sensor gave none.
    #[serde(rename = "speed")]
    pub speed_mps: f64,
    pub vehicle_id: VehicleId,
    #[serde(skip_serializing)]
    pub captured_at: DateTime<Utc>,
}

impl LocationReport {
    pub fn from_sample(vehicle_id: VehicleId, sample: &PositionSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed_mps: sample.speed_mps.filter(|s| s.is_finite()).unwrap_or(0.0),
            vehicle_id,
            captured_at: sample.captured_at,
        }
    }
}
