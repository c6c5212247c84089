use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::error::StoreError;
use super::types::{AuthState, SignOutReason, VehicleId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vehicle_id: Option<VehicleId>,
}

struct Inner {
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
    auth_tx: watch::Sender<AuthState>,
}

/// Credential and vehicle selection shared by the whole client.
///
/// Cloning is cheap and every clone sees the same state. When backed by a
/// file, each mutation is written through so the selection survives a
/// restart.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn in_memory() -> Self {
        Self::with_state(None, PersistedState::default())
    }

    /// Opens the state file at `path`. A missing file is an empty context.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                PersistedState::default()
            } else {
                serde_yaml::from_str(&content)?
            }
        } else {
            PersistedState::default()
        };
        Ok(Self::with_state(Some(path), state))
    }

    fn with_state(path: Option<PathBuf>, state: PersistedState) -> Self {
        let initial = if state.token.is_some() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut(SignOutReason::Logout)
        };
        let (auth_tx, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                path,
                state: Mutex::new(state),
                auth_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PersistedState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credential(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn set_credential(&self, token: String) {
        self.update(|state| state.token = Some(token));
        self.inner.auth_tx.send_replace(AuthState::SignedIn);
    }

    pub fn selected_vehicle(&self) -> Option<VehicleId> {
        self.lock().vehicle_id
    }

    pub fn select_vehicle(&self, vehicle_id: VehicleId) {
        info!("Vehicle {} selected", vehicle_id);
        self.update(|state| state.vehicle_id = Some(vehicle_id));
    }

    pub fn clear_vehicle(&self) {
        self.update(|state| state.vehicle_id = None);
    }

    pub fn auth_state(&self) -> AuthState {
        *self.inner.auth_tx.borrow()
    }

    /// Notifies on every sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.auth_tx.subscribe()
    }

    /// Clears credential and vehicle selection.
    pub fn logout(&self) {
        self.sign_out(SignOutReason::Logout);
    }

    /// Same as [`logout`](Self::logout), for a credential the backend refused.
    pub fn expire(&self) {
        self.sign_out(SignOutReason::Unauthorized);
    }

    fn sign_out(&self, reason: SignOutReason) {
        info!("Signing out ({:?})", reason);
        self.update(|state| {
            state.token = None;
            state.vehicle_id = None;
        });
        self.inner.auth_tx.send_replace(AuthState::SignedOut(reason));
    }

    fn update(&self, f: impl FnOnce(&mut PersistedState)) {
        let snapshot = {
            let mut state = self.lock();
            f(&mut state);
            state.clone()
        };
        if let Err(e) = self.persist(&snapshot) {
            error!("Failed to persist session state: {}", e);
        }
    }

    fn persist(&self, state: &PersistedState) -> Result<(), StoreError> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_yaml::to_string(state)?)?;
        Ok(())
    }
}
