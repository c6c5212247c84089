mod inhibitor;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

pub use inhibitor::InhibitorWakeLock;

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Ownership token for a held screen wake lock.
#[derive(Debug, PartialEq, Eq)]
pub struct WakeLockHandle {
    id: u64,
}

impl WakeLockHandle {
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for WakeLockHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the display awake.
///
/// Acquisition never fails loudly: a device without the capability, or one
/// that refuses the request, resolves to `None`.
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn acquire(&self) -> Option<WakeLockHandle>;

    /// Releasing a handle twice, or one this lock never issued, does nothing.
    fn release(&self, handle: WakeLockHandle);
}

pub struct UnsupportedWakeLock;

#[async_trait]
impl WakeLock for UnsupportedWakeLock {
    async fn acquire(&self) -> Option<WakeLockHandle> {
        None
    }

    fn release(&self, _handle: WakeLockHandle) {}
}
