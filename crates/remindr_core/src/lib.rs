//! Core domain logic for Remindr.
//! Task storage plus reminder scheduling and delivery; hosts plug in the
//! OS alarm, notification and wake-lock facilities.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod platform;
pub mod reminder;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ReminderConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::task::{Priority, Task, TaskId, TaskValidationError};
pub use platform::alarm::{
    AlarmFacility, DeliveryKind, TriggerEvent, TriggerPayload, ACTION_SHOW_REMINDER,
};
pub use platform::clock::{Clock, ManualClock, SystemClock};
pub use platform::notify::{NotificationPayload, NotificationSurface, REMINDER_CHANNEL_ID};
pub use platform::tokio_alarm::TokioAlarmFacility;
pub use platform::wake_lock::{NoopWakeLocks, WakeLock, WakeLockProvider};
pub use platform::{PlatformError, PlatformSeam};
pub use reminder::boot::{is_boot_signal, BootRecovery, BootRecoveryReport, BOOT_ACTIONS};
pub use reminder::dispatcher::{AbandonReason, DispatchOutcome, NotificationDispatcher};
pub use reminder::permission::{PermissionFlag, PermissionGate};
pub use reminder::scheduler::{ReminderScheduler, ScheduleOutcome, SkipReason};
pub use repo::preference_repo::{InMemoryPreferenceStore, PreferenceStore, SqlitePreferenceStore};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::task_service::{NewTask, TaskDateGroup, TaskService, TaskServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
