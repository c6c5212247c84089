//! Scripted adapters for driving the manager deterministically.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

use crate::position::{
    CapabilityError, EventSender, PositionEvent, PositionOptions, PositionSource, Subscription,
    WatchHandle,
};
use crate::uplink::{Uplink, UplinkError};
use crate::wake_lock::{WakeLock, WakeLockHandle};

use super::LocationReport;

pub struct FakeSource {
    available: bool,
    senders: Mutex<Vec<EventSender>>,
    handles: Mutex<Vec<WatchHandle>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            available: true,
            senders: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn last_handle(&self) -> Option<WatchHandle> {
        self.handles.lock().unwrap().last().cloned()
    }

    /// Delivers an event on the newest subscription. False when it was cancelled.
    pub async fn emit(&self, event: PositionEvent) -> bool {
        let sender = self.senders.lock().unwrap().pop();
        let Some(sender) = sender else {
            return false;
        };
        let delivered = sender.send(event).await;
        self.senders.lock().unwrap().push(sender);
        delivered
    }

    /// Ends every subscription as a device-level failure would.
    pub fn close(&self) {
        self.senders.lock().unwrap().clear();
    }
}

impl PositionSource for FakeSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn subscribe(&self, _options: PositionOptions) -> Result<Subscription, CapabilityError> {
        if !self.available {
            return Err(CapabilityError::Unsupported);
        }
        let (subscription, sender) = Subscription::channel();
        self.senders.lock().unwrap().push(sender);
        self.handles.lock().unwrap().push(subscription.handle.clone());
        Ok(subscription)
    }
}

pub struct FakeWakeLock {
    grant: bool,
    delay: Duration,
    acquired: Mutex<usize>,
    released: Mutex<Vec<u64>>,
}

impl FakeWakeLock {
    pub fn granting() -> Self {
        Self::granting_after(Duration::ZERO)
    }

    pub fn granting_after(delay: Duration) -> Self {
        Self {
            grant: true,
            delay,
            acquired: Mutex::new(0),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing() -> Self {
        Self {
            grant: false,
            ..Self::granting()
        }
    }

    pub fn acquire_count(&self) -> usize {
        *self.acquired.lock().unwrap()
    }

    pub fn released(&self) -> Vec<u64> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl WakeLock for FakeWakeLock {
    async fn acquire(&self) -> Option<WakeLockHandle> {
        *self.acquired.lock().unwrap() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.grant.then(WakeLockHandle::new)
    }

    fn release(&self, handle: WakeLockHandle) {
        self.released.lock().unwrap().push(handle.id());
    }
}

pub struct FakeUplink {
    failure: Option<UplinkError>,
    /// Submissions never complete.
    stall: bool,
    reports: Mutex<Vec<LocationReport>>,
    attempts: watch::Sender<usize>,
}

impl FakeUplink {
    pub fn accepting() -> Self {
        Self {
            failure: None,
            stall: false,
            reports: Mutex::new(Vec::new()),
            attempts: watch::channel(0).0,
        }
    }

    pub fn failing(error: UplinkError) -> Self {
        Self {
            failure: Some(error),
            ..Self::accepting()
        }
    }

    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::accepting()
        }
    }

    pub fn reports(&self) -> Vec<LocationReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.borrow()
    }

    pub async fn wait_for_attempts(&self, count: usize) {
        let mut rx = self.attempts.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count))
            .await
            .expect("timed out waiting for uplink attempts")
            .expect("attempt channel closed");
    }
}

#[async_trait]
impl Uplink for FakeUplink {
    async fn submit(&self, report: &LocationReport) -> Result<(), UplinkError> {
        self.reports.lock().unwrap().push(report.clone());
        self.attempts.send_modify(|n| *n += 1);
        if self.stall {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
