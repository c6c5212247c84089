mod error;
mod http;

use async_trait::async_trait;

use crate::session::LocationReport;

pub use error::UplinkError;
pub use http::HttpUplink;

/// Sends one location report to the backend.
///
/// Failures are returned to the caller as-is; nothing is retried here.
#[async_trait]
pub trait Uplink: Send + Sync {
    async fn submit(&self, report: &LocationReport) -> Result<(), UplinkError>;
}
