use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::{AuthState, SessionContext};
use crate::position::{
    PositionEvent, PositionOptions, PositionSample, PositionSource, SignalError, WatchHandle,
};
use crate::uplink::Uplink;
use crate::wake_lock::{WakeLock, WakeLockHandle};

use super::error::{PreconditionError, SessionError};
use super::report::LocationReport;
use super::types::{Position, SessionSnapshot, TrackingStatus};

const SOURCE_ENDED: &str = "Location updates stopped";
const SIGNED_OUT: &str = "Signed out";

#[derive(Debug)]
struct ActiveWatch {
    session_id: Uuid,
    handle: WatchHandle,
    worker: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: SessionSnapshot,
    /// Present from `start` until the session returns to idle.
    watch: Option<ActiveWatch>,
    wake_lock: Option<WakeLockHandle>,
}

impl Shared {
    fn is_current(&self, session_id: Uuid) -> bool {
        self.watch
            .as_ref()
            .is_some_and(|w| w.session_id == session_id && w.handle.is_active())
    }
}

struct Core {
    context: SessionContext,
    source: Arc<dyn PositionSource>,
    wake_lock: Arc<dyn WakeLock>,
    uplink: Arc<dyn Uplink>,
    shared: Mutex<Shared>,
    status_tx: watch::Sender<SessionSnapshot>,
}

/// Owns one live tracking session at a time.
///
/// Every fix updates the observable position and is handed to the uplink on
/// its own task, so a slow or failing network never holds up sensing. The
/// watch subscription and wake lock are released on `stop`, when the source
/// gives up, and when the context signs out.
#[derive(Clone)]
pub struct TrackingSessionManager {
    core: Arc<Core>,
}

impl TrackingSessionManager {
    pub fn new(
        context: SessionContext,
        source: Arc<dyn PositionSource>,
        wake_lock: Arc<dyn WakeLock>,
        uplink: Arc<dyn Uplink>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            core: Arc::new(Core {
                context,
                source,
                wake_lock,
                uplink,
                shared: Mutex::new(Shared::default()),
                status_tx,
            }),
        }
    }

    pub fn status(&self) -> SessionSnapshot {
        self.core.lock().snapshot.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionSnapshot> {
        self.core.status_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.core.lock().watch.is_some()
    }

    /// Subscribes to position updates for the selected vehicle.
    ///
    /// The wake lock is requested in the background and its absence never
    /// fails the session.
    pub fn start(&self) -> Result<SessionSnapshot, SessionError> {
        let core = &self.core;
        let mut shared = core.lock();
        if shared.watch.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let Some(vehicle_id) = core.context.selected_vehicle() else {
            return Err(core.reject(&mut shared, PreconditionError::NoVehicleSelected));
        };
        if !core.source.is_available() {
            return Err(core.reject(&mut shared, PreconditionError::SensingUnsupported));
        }
        let subscription = match core.source.subscribe(PositionOptions::default()) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Position source refused subscription: {}", e);
                return Err(core.reject(&mut shared, PreconditionError::SensingUnsupported));
            }
        };

        let session_id = Uuid::new_v4();
        let auth_rx = core.context.subscribe();
        let worker = tokio::spawn(pump(
            core.clone(),
            session_id,
            subscription.events,
            auth_rx,
        ));
        shared.watch = Some(ActiveWatch {
            session_id,
            handle: subscription.handle,
            worker,
        });

        let snapshot = &mut shared.snapshot;
        snapshot.session_id = Some(session_id);
        snapshot.status = TrackingStatus::RequestingSensor;
        snapshot.vehicle_id = Some(vehicle_id);
        snapshot.last_error = None;
        snapshot.watch_active = true;
        snapshot.wake_lock_held = false;
        core.publish(&shared);
        info!("Session {} started for vehicle {}", session_id, vehicle_id);

        let lock_core = core.clone();
        tokio::spawn(async move {
            let handle = lock_core.wake_lock.acquire().await;
            lock_core.install_wake_lock(session_id, handle);
        });

        Ok(shared.snapshot.clone())
    }

    /// Unsubscribes and releases the wake lock. Safe from any state, any
    /// number of times. Uplinks already in flight finish on their own.
    pub fn stop(&self) -> SessionSnapshot {
        let mut shared = self.core.lock();
        self.core.teardown(&mut shared, None);
        shared.snapshot.clone()
    }

    /// The single on/off control.
    pub fn toggle(&self) -> Result<SessionSnapshot, SessionError> {
        if self.is_active() {
            Ok(self.stop())
        } else {
            self.start()
        }
    }

    /// Called when the session screen is entered. Without a selected vehicle
    /// any running session is torn down and the caller should send the driver
    /// to vehicle setup.
    pub fn enter(&self) -> Result<SessionSnapshot, PreconditionError> {
        if self.core.context.selected_vehicle().is_none() {
            self.stop();
            return Err(PreconditionError::NoVehicleSelected);
        }
        Ok(self.status())
    }

    /// Stops the session, then signs the context out. An active session is
    /// only dropped once the driver confirmed it.
    pub fn logout(&self, confirmed: bool) -> Result<(), SessionError> {
        if self.is_active() && !confirmed {
            return Err(SessionError::ConfirmationRequired);
        }
        self.stop();
        self.core.context.logout();
        Ok(())
    }
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, shared: &Shared) {
        self.status_tx.send_replace(shared.snapshot.clone());
    }

    fn reject(&self, shared: &mut Shared, error: PreconditionError) -> SessionError {
        warn!("Cannot start tracking: {}", error);
        shared.snapshot.last_error = Some(error.to_string());
        self.publish(shared);
        SessionError::Precondition(error)
    }

    fn teardown(&self, shared: &mut Shared, reason: Option<&str>) {
        if let Some(active) = shared.watch.take() {
            self.source.unsubscribe(&active.handle);
            active.worker.abort();
            info!("Session {} stopped", active.session_id);
        }
        if let Some(handle) = shared.wake_lock.take() {
            self.wake_lock.release(handle);
        }

        let snapshot = &mut shared.snapshot;
        snapshot.session_id = None;
        snapshot.status = TrackingStatus::Idle;
        snapshot.watch_active = false;
        snapshot.wake_lock_held = false;
        if let Some(reason) = reason {
            snapshot.last_error = Some(reason.to_string());
        }
        self.publish(shared);
    }

    fn install_wake_lock(&self, session_id: Uuid, handle: Option<WakeLockHandle>) {
        let Some(handle) = handle else {
            warn!("Wake lock unavailable, tracking continues without it");
            return;
        };
        let mut shared = self.lock();
        if !shared.is_current(session_id) || shared.wake_lock.is_some() {
            debug!("Session {} is over, releasing late wake lock", session_id);
            self.wake_lock.release(handle);
            return;
        }
        shared.wake_lock = Some(handle);
        shared.snapshot.wake_lock_held = true;
        self.publish(&shared);
    }

    fn on_sample(&self, session_id: Uuid, sample: PositionSample) {
        let report = {
            let mut shared = self.lock();
            if !shared.is_current(session_id) {
                return;
            }
            let Some(vehicle_id) = shared.snapshot.vehicle_id else {
                return;
            };
            if shared.snapshot.status != TrackingStatus::Tracking {
                info!("Session {} received first fix", session_id);
            }
            let snapshot = &mut shared.snapshot;
            snapshot.status = TrackingStatus::Tracking;
            snapshot.current_position = Some(Position {
                latitude: sample.latitude,
                longitude: sample.longitude,
            });
            snapshot.last_updated_at = Some(Utc::now());
            self.publish(&shared);
            LocationReport::from_sample(vehicle_id, &sample)
        };

        debug!(
            "Fix {:.6}, {:.6} for vehicle {}",
            report.latitude, report.longitude, report.vehicle_id
        );
        let uplink = self.uplink.clone();
        tokio::spawn(async move {
            if let Err(e) = uplink.submit(&report).await {
                warn!("Failed to update location: {}", e);
            }
        });
    }

    fn on_signal_error(&self, session_id: Uuid, error: SignalError) {
        let mut shared = self.lock();
        if !shared.is_current(session_id) {
            return;
        }
        warn!("Session {} sensor error: {}", session_id, error);
        shared.snapshot.last_error = Some(error.advisory());
        self.publish(&shared);
    }

    fn end(&self, session_id: Uuid, reason: &str) {
        let mut shared = self.lock();
        if shared.is_current(session_id) {
            warn!("Session {} ending: {}", session_id, reason);
            self.teardown(&mut shared, Some(reason));
        }
    }
}

async fn pump(
    core: Arc<Core>,
    session_id: Uuid,
    mut events: mpsc::Receiver<PositionEvent>,
    mut auth_rx: watch::Receiver<AuthState>,
) {
    let mut auth_open = true;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PositionEvent::Sample(sample)) => core.on_sample(session_id, sample),
                Some(PositionEvent::Error(error)) => core.on_signal_error(session_id, error),
                None => {
                    core.end(session_id, SOURCE_ENDED);
                    return;
                }
            },
            changed = auth_rx.changed(), if auth_open => {
                if changed.is_err() {
                    auth_open = false;
                    continue;
                }
                let signed_out = auth_rx.borrow_and_update().is_signed_out();
                if signed_out {
                    core.end(session_id, SIGNED_OUT);
                    return;
                }
            }
        }
    }
}
