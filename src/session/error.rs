use thiserror::Error;

/// Why a session cannot start.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no vehicle selected")]
    NoVehicleSelected,
    #[error("location sensing is not supported on this device")]
    SensingUnsupported,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("tracking session already active")]
    AlreadyActive,
    #[error("tracking is active, confirm to stop and log out")]
    ConfirmationRequired,
}
