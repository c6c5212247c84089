use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::session::{PreconditionError, SessionError};

pub enum ApiError {
    Precondition(PreconditionError),
    Validation(String),
    Conflict(&'static str),
}

impl From<PreconditionError> for ApiError {
    fn from(e: PreconditionError) -> Self {
        ApiError::Precondition(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Precondition(e) => ApiError::Precondition(e),
            SessionError::AlreadyActive => ApiError::Conflict("session_active"),
            SessionError::ConfirmationRequired => ApiError::Conflict("confirmation_required"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Precondition(e) => {
                let code = match e {
                    PreconditionError::NoVehicleSelected => "no_vehicle_selected",
                    PreconditionError::SensingUnsupported => "sensing_unsupported",
                };
                (
                    StatusCode::PRECONDITION_FAILED,
                    Json(ErrorResponse::with_message(code, &e.to_string())),
                )
                    .into_response()
            }
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("validation_failed", &msg)),
            )
                .into_response(),
            ApiError::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(reason))).into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}
