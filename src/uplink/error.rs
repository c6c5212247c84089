use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UplinkError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}
