use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::session::{CredentialRequest, LogoutRequest, SelectVehicleRequest};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::session::status,
        super::api::session::enter,
        super::api::session::start,
        super::api::session::stop,
        super::api::session::toggle,
        super::api::session::logout,
        super::api::session::select_vehicle,
        super::api::session::clear_vehicle,
        super::api::session::set_credential,
    ),
    components(
        schemas(
            ErrorResponse,
            LogoutRequest,
            SelectVehicleRequest,
            CredentialRequest,
            crate::session::SessionSnapshot,
            crate::session::TrackingStatus,
            crate::session::Position,
            crate::context::VehicleId,
        )
    ),
    info(
        title = "Driver Tracker Control API",
        description = "Start, stop and observe the live location tracking session",
        version = "0.1.0"
    ),
    tags(
        (name = "session", description = "Tracking session control"),
        (name = "context", description = "Credential and vehicle selection")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_control_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for path in [
            "/api/session",
            "/api/session/start",
            "/api/session/stop",
            "/api/session/logout",
            "/api/vehicle",
            "/api/credential",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == path),
                "missing {}",
                path
            );
        }
    }
}
