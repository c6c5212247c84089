mod error;
mod manager;
mod report;
mod types;

#[cfg(test)]
pub(crate) mod fakes;

pub use error::{PreconditionError, SessionError};
pub use manager::TrackingSessionManager;
pub use report::LocationReport;
pub use types::{Position, SessionSnapshot, TrackingStatus};
