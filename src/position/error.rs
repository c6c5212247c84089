use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The device cannot sense position at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("location sensing is not available on this device")]
    Unsupported,
}

/// A runtime failure reported by an active subscription.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout")]
    Timeout,
}

impl SignalError {
    /// Text shown to the driver while the session keeps running.
    pub fn advisory(&self) -> String {
        format!("Unable to retrieve location: {}", self)
    }
}
