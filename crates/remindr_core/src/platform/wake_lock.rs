//! Keeps the device awake while a trigger is processed.

use crate::platform::PlatformError;
use log::{debug, warn};
use std::time::Duration;

/// Tag attached to every reminder wake lock.
pub const REMINDER_WAKE_LOCK_TAG: &str = "remindr:notification";

pub trait WakeLockProvider: Send + Sync {
    /// Acquires a lock that the OS drops on its own after `timeout`.
    fn acquire(&self, tag: &str, timeout: Duration) -> Result<Box<dyn WakeLock>, PlatformError>;
}

pub trait WakeLock: Send {
    fn is_held(&self) -> bool;
    fn release(&mut self) -> Result<(), PlatformError>;
}

/// Provider for hosts with no wake-lock concept.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWakeLocks;

struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn is_held(&self) -> bool {
        false
    }

    fn release(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }
}

impl WakeLockProvider for NoopWakeLocks {
    fn acquire(&self, _tag: &str, _timeout: Duration) -> Result<Box<dyn WakeLock>, PlatformError> {
        Ok(Box::new(NoopWakeLock))
    }
}

/// Releases the wrapped lock when dropped.
///
/// An absent lock (acquisition failed) is allowed; dispatch proceeds without it.
pub struct WakeLockGuard {
    lock: Option<Box<dyn WakeLock>>,
}

impl WakeLockGuard {
    pub fn acquire(provider: &dyn WakeLockProvider, timeout: Duration) -> Self {
        let lock = match provider.acquire(REMINDER_WAKE_LOCK_TAG, timeout) {
            Ok(lock) => Some(lock),
            Err(err) => {
                warn!(
                    "event=wake_lock_acquire module=platform status=error error={}",
                    err
                );
                None
            }
        };
        Self { lock }
    }

    pub fn is_held(&self) -> bool {
        self.lock.as_ref().is_some_and(|lock| lock.is_held())
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        let Some(mut lock) = self.lock.take() else {
            return;
        };
        if !lock.is_held() {
            return;
        }
        match lock.release() {
            Ok(()) => debug!("event=wake_lock_release module=platform status=ok"),
            Err(err) => warn!(
                "event=wake_lock_release module=platform status=error error={}",
                err
            ),
        }
    }
}
