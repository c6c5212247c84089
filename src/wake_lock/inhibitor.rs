use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};

use super::{WakeLock, WakeLockHandle};

const SETTLE: Duration = Duration::from_millis(200);

/// Holds the screen awake by keeping an idle-inhibitor process alive,
/// e.g. `systemd-inhibit --what=idle sleep infinity` or `caffeinate -d`.
///
/// The lock counts as acquired once the process survives a short settle
/// window; a command that cannot start or exits right away means the
/// request was refused.
pub struct InhibitorWakeLock {
    command: String,
    held: Mutex<HashMap<u64, Child>>,
}

impl InhibitorWakeLock {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            held: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl WakeLock for InhibitorWakeLock {
    async fn acquire(&self) -> Option<WakeLockHandle> {
        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Wake lock command failed to start: {}", e);
                return None;
            }
        };

        match tokio::time::timeout(SETTLE, child.wait()).await {
            Ok(Ok(status)) => {
                warn!("Wake lock refused, inhibitor exited with {}", status);
                return None;
            }
            Ok(Err(e)) => {
                warn!("Wake lock inhibitor wait error: {}", e);
                return None;
            }
            Err(_) => {}
        }

        let handle = WakeLockHandle::new();
        info!(
            "Wake lock {} acquired (PID: {:?})",
            handle.id(),
            child.id()
        );
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id(), child);
        Some(handle)
    }

    fn release(&self, handle: WakeLockHandle) {
        let child = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
        match child {
            Some(mut child) => {
                if let Err(e) = child.start_kill() {
                    debug!("Wake lock {} inhibitor already gone: {}", handle.id(), e);
                }
                info!("Wake lock {} released", handle.id());
            }
            None => debug!("Wake lock {} was not held", handle.id()),
        }
    }
}
