use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::context::VehicleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Idle,
    /// Subscribed, waiting for the first fix.
    RequestingSensor,
    Tracking,
}

/// WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// What the presentation layer sees of the session.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub status: TrackingStatus,
    pub vehicle_id: Option<VehicleId>,
    pub current_position: Option<Position>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub watch_active: bool,
    pub wake_lock_held: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            status: TrackingStatus::Idle,
            vehicle_id: None,
            current_position: None,
            last_updated_at: None,
            last_error: None,
            watch_active: false,
            wake_lock_held: false,
        }
    }
}
