use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Identifier of the vehicle a driver selected for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct VehicleId(pub i64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    /// The driver logged out.
    Logout,
    /// The backend rejected the credential with a 401.
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    SignedIn,
    SignedOut(SignOutReason),
}

impl AuthState {
    pub fn is_signed_out(&self) -> bool {
        matches!(self, AuthState::SignedOut(_))
    }
}
