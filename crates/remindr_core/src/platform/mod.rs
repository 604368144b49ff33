//! Seams to the host operating system.
//!
//! # Responsibility
//! - Describe the alarm, notification, wake-lock and clock facilities the
//!   reminder subsystem needs, without binding to one platform.
//! - Provide adapters usable on desktop hosts (`TokioAlarmFacility`,
//!   `SystemClock`, `NoopWakeLocks`).
//!
//! # Invariants
//! - Every seam trait is `Send + Sync`; adapters are shared through `Arc`.
//! - Seam failures surface as `PlatformError`, never as panics.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod alarm;
pub mod clock;
pub mod notify;
pub mod tokio_alarm;
pub mod wake_lock;

/// Which OS facility failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSeam {
    Alarm,
    Notification,
    WakeLock,
}

impl PlatformSeam {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alarm => "alarm",
            Self::Notification => "notification",
            Self::WakeLock => "wake_lock",
        }
    }
}

/// Failure reported by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub seam: PlatformSeam,
    pub message: String,
}

impl PlatformError {
    pub fn alarm(message: impl Into<String>) -> Self {
        Self {
            seam: PlatformSeam::Alarm,
            message: message.into(),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self {
            seam: PlatformSeam::Notification,
            message: message.into(),
        }
    }

    pub fn wake_lock(message: impl Into<String>) -> Self {
        Self {
            seam: PlatformSeam::WakeLock,
            message: message.into(),
        }
    }
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} facility failed: {}", self.seam.as_str(), self.message)
    }
}

impl Error for PlatformError {}
