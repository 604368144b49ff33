//! Notification permission gate.
//!
//! # Invariants
//! - The query is side-effect free and cannot fail; unknown means denied.

use std::sync::atomic::{AtomicBool, Ordering};

/// "May this process display user-visible notifications right now?"
pub trait PermissionGate: Send + Sync {
    fn notifications_permitted(&self) -> bool;
}

/// Permission state pushed in by the host whenever the OS grant changes.
#[derive(Debug, Default)]
pub struct PermissionFlag {
    granted: AtomicBool,
}

impl PermissionFlag {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionGate for PermissionFlag {
    fn notifications_permitted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{PermissionFlag, PermissionGate};

    #[test]
    fn default_flag_denies_until_granted() {
        let flag = PermissionFlag::default();
        assert!(!flag.notifications_permitted());
        flag.set_granted(true);
        assert!(flag.notifications_permitted());
    }
}
