mod error;
mod replay;
mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use error::{CapabilityError, SignalError};
pub use replay::{ReplaySource, Track, TrackError};
pub use types::{PositionEvent, PositionOptions, PositionSample};

static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Continuous position sensing.
///
/// A subscription delivers samples and errors one at a time until it is
/// unsubscribed or the device gives up, in which case the event channel
/// closes.
pub trait PositionSource: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn subscribe(&self, options: PositionOptions) -> Result<Subscription, CapabilityError>;

    /// Safe to call on a handle that is already inactive.
    fn unsubscribe(&self, handle: &WatchHandle) {
        handle.cancel();
    }
}

/// Ownership token for one active subscription.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: u64,
    token: CancellationToken,
}

impl WatchHandle {
    fn new() -> Self {
        Self {
            id: NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn cancel(&self) {
        self.token.cancel();
    }
}

pub struct Subscription {
    pub handle: WatchHandle,
    pub events: mpsc::Receiver<PositionEvent>,
}

impl Subscription {
    /// Creates a subscription together with the sender a source feeds it through.
    pub fn channel() -> (Subscription, EventSender) {
        // Capacity 1: the producer waits until the previous event is taken.
        let (tx, events) = mpsc::channel(1);
        let handle = WatchHandle::new();
        let sender = EventSender {
            tx,
            token: handle.token.clone(),
        };
        (Subscription { handle, events }, sender)
    }
}

/// Producer side of a [`Subscription`].
pub struct EventSender {
    tx: mpsc::Sender<PositionEvent>,
    token: CancellationToken,
}

impl EventSender {
    /// Returns false once the subscription is cancelled or its receiver is gone.
    pub async fn send(&self, event: PositionEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Sleeps for `duration`, returning false early on cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Stand-in for a device without any position sensing.
pub struct UnavailableSource;

impl PositionSource for UnavailableSource {
    fn is_available(&self) -> bool {
        false
    }

    fn subscribe(&self, _options: PositionOptions) -> Result<Subscription, CapabilityError> {
        Err(CapabilityError::Unsupported)
    }
}
