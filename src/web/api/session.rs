use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::context::VehicleId;
use crate::session::SessionSnapshot;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Must be true to end an active session.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectVehicleRequest {
    pub vehicle_id: VehicleId,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialRequest {
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot)
    ),
    tag = "session"
)]
pub async fn status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.manager.status())
}

#[utoipa::path(
    post,
    path = "/api/session/enter",
    responses(
        (status = 200, description = "Session screen entered", body = SessionSnapshot),
        (status = 412, description = "No vehicle selected", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn enter(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.manager.enter()?))
}

#[utoipa::path(
    post,
    path = "/api/session/start",
    responses(
        (status = 200, description = "Tracking started", body = SessionSnapshot),
        (status = 409, description = "Session already active", body = ErrorResponse),
        (status = 412, description = "No vehicle selected or no position sensing", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn start(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.manager.start()?))
}

#[utoipa::path(
    post,
    path = "/api/session/stop",
    responses(
        (status = 200, description = "Tracking stopped", body = SessionSnapshot)
    ),
    tag = "session"
)]
pub async fn stop(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.manager.stop())
}

#[utoipa::path(
    post,
    path = "/api/session/toggle",
    responses(
        (status = 200, description = "Tracking toggled", body = SessionSnapshot),
        (status = 412, description = "No vehicle selected or no position sensing", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn toggle(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.manager.toggle()?))
}

#[utoipa::path(
    post,
    path = "/api/session/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Signed out", body = SessionSnapshot),
        (status = 409, description = "Tracking is active and logout was not confirmed", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.manager.logout(request.confirm)?;
    Ok(Json(state.manager.status()))
}

#[utoipa::path(
    put,
    path = "/api/vehicle",
    request_body = SelectVehicleRequest,
    responses(
        (status = 204, description = "Vehicle selected")
    ),
    tag = "context"
)]
pub async fn select_vehicle(
    State(state): State<AppState>,
    Json(request): Json<SelectVehicleRequest>,
) -> StatusCode {
    state.context.select_vehicle(request.vehicle_id);
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    delete,
    path = "/api/vehicle",
    responses(
        (status = 204, description = "Vehicle selection cleared")
    ),
    tag = "context"
)]
pub async fn clear_vehicle(State(state): State<AppState>) -> StatusCode {
    state.context.clear_vehicle();
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    put,
    path = "/api/credential",
    request_body = CredentialRequest,
    responses(
        (status = 204, description = "Credential stored"),
        (status = 400, description = "Empty token", body = ErrorResponse)
    ),
    tag = "context"
)]
pub async fn set_credential(
    State(state): State<AppState>,
    Json(request): Json<CredentialRequest>,
) -> ApiResult<StatusCode> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation("token must not be empty".into()));
    }
    state.context.set_credential(token.to_string());
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use crate::session::fakes::{FakeSource, FakeUplink, FakeWakeLock};
    use crate::session::{TrackingSessionManager, TrackingStatus};
    use crate::web::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let context = SessionContext::in_memory();
        let manager = TrackingSessionManager::new(
            context.clone(),
            Arc::new(FakeSource::new()),
            Arc::new(FakeWakeLock::granting()),
            Arc::new(FakeUplink::accepting()),
        );
        AppState { context, manager }
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn start_without_vehicle_is_a_failed_precondition() {
        let state = app_state();

        let (status, body) = call(&state, "POST", "/api/session/start", None).await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "no_vehicle_selected");
        let (_, body) = call(&state, "GET", "/api/session", None).await;
        assert_eq!(body["status"], "idle");
    }

    #[tokio::test]
    async fn select_vehicle_then_start_and_stop() {
        let state = app_state();

        let (status, _) = call(&state, "PUT", "/api/vehicle", Some(json!({"vehicle_id": 42}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&state, "POST", "/api/session/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "requesting_sensor");
        assert_eq!(body["vehicle_id"], 42);

        let (status, body) = call(&state, "POST", "/api/session/start", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "session_active");

        let (status, body) = call(&state, "POST", "/api/session/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "idle");
        assert_eq!(body["watch_active"], false);
    }

    #[tokio::test]
    async fn logout_while_tracking_requires_confirmation() {
        let state = app_state();
        state.context.set_credential("token".into());
        state.context.select_vehicle(VehicleId(7));
        state.manager.start().unwrap();

        let (status, body) = call(
            &state,
            "POST",
            "/api/session/logout",
            Some(json!({"confirm": false})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "confirmation_required");
        assert!(state.manager.is_active());

        let (status, body) = call(
            &state,
            "POST",
            "/api/session/logout",
            Some(json!({"confirm": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "idle");
        assert_eq!(state.context.credential(), None);
        assert_eq!(state.manager.status().status, TrackingStatus::Idle);
    }

    #[tokio::test]
    async fn enter_without_vehicle_redirects_to_setup() {
        let state = app_state();
        let (status, body) = call(&state, "POST", "/api/session/enter", None).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "no_vehicle_selected");
    }

    #[tokio::test]
    async fn clearing_vehicle_then_entering_stops_session() {
        let state = app_state();
        state.context.select_vehicle(VehicleId(5));
        state.manager.start().unwrap();

        let (status, _) = call(&state, "DELETE", "/api/vehicle", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, "POST", "/api/session/enter", None).await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert!(!state.manager.is_active());
    }

    #[tokio::test]
    async fn empty_credential_is_rejected() {
        let state = app_state();
        let (status, body) = call(&state, "PUT", "/api/credential", Some(json!({"token": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");

        let (status, _) = call(&state, "PUT", "/api/credential", Some(json!({"token": "abc"}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.context.credential().as_deref(), Some("abc"));
    }
}
