//! Reminder subsystem tuning.
//!
//! # Responsibility
//! - Hold the retry, grace-window and delay constants used by reminders.
//! - Load overrides from JSON; any omitted field keeps its default.
//!
//! # Invariants
//! - `max_registration_attempts >= 1`.
//! - `wake_lock_timeout_ms > 0`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

const FIVE_MINUTES_MS: u64 = 5 * 60 * 1000;

/// Tunables for scheduling, dispatch and boot recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Alarm registration attempts before giving up.
    pub max_registration_attempts: u32,
    /// Fixed wait between registration attempts.
    pub registration_retry_delay_ms: u64,
    /// How long past its instant a reminder may still be displayed.
    pub display_grace_ms: u64,
    /// When registration fails, reminders due within this window are shown
    /// right away instead.
    pub immediate_fallback_window_ms: u64,
    /// Wait after a boot signal before touching the store.
    pub boot_grace_delay_ms: u64,
    /// Pause between consecutive registrations during boot recovery.
    pub boot_inter_task_delay_ms: u64,
    /// Upper bound on how long one dispatch keeps the device awake.
    pub wake_lock_timeout_ms: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            max_registration_attempts: 3,
            registration_retry_delay_ms: 1_000,
            display_grace_ms: FIVE_MINUTES_MS,
            immediate_fallback_window_ms: FIVE_MINUTES_MS,
            boot_grace_delay_ms: 5_000,
            boot_inter_task_delay_ms: 100,
            wake_lock_timeout_ms: 60_000,
        }
    }
}

impl ReminderConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_registration_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_registration_attempts must be at least 1",
            ));
        }
        if self.wake_lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("wake_lock_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn registration_retry_delay(&self) -> Duration {
        Duration::from_millis(self.registration_retry_delay_ms)
    }

    pub fn boot_grace_delay(&self) -> Duration {
        Duration::from_millis(self.boot_grace_delay_ms)
    }

    pub fn boot_inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.boot_inter_task_delay_ms)
    }

    pub fn wake_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.wake_lock_timeout_ms)
    }

    pub(crate) fn display_grace_ms_i64(&self) -> i64 {
        i64::try_from(self.display_grace_ms).unwrap_or(i64::MAX)
    }

    pub(crate) fn immediate_fallback_window_ms_i64(&self) -> i64 {
        i64::try_from(self.immediate_fallback_window_ms).unwrap_or(i64::MAX)
    }
}

/// Configuration load failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read config `{path}`: {message}"),
            Self::Parse(message) => write!(f, "invalid reminder config: {message}"),
            Self::Invalid(message) => write!(f, "invalid reminder config: {message}"),
        }
    }
}

impl Error for ConfigError {}
