use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::error::SignalError;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// One fix as delivered by the device, WGS84 degrees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in m/s, when the sensor reports one.
    pub speed_mps: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, speed_mps: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            speed_mps,
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the source may hand out. Zero means always a fresh fix.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Sample(PositionSample),
    Error(SignalError),
}
