mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::SessionContext;
pub use types::{AuthState, SignOutReason, VehicleId};
