//! User-visible notification display.

use crate::model::task::TaskId;
use crate::platform::PlatformError;
use serde::{Deserialize, Serialize};

/// Channel all reminder notifications are posted to.
pub const REMINDER_CHANNEL_ID: &str = "task_reminders";
/// User-facing channel name.
pub const REMINDER_CHANNEL_NAME: &str = "Task reminders";

/// Content of one reminder notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification id; one visible notification per task.
    pub notification_id: TaskId,
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub summary: String,
    /// Task opened when the notification is tapped.
    pub open_task_id: TaskId,
}

/// OS notification facility.
pub trait NotificationSurface: Send + Sync {
    fn show(&self, payload: &NotificationPayload) -> Result<(), PlatformError>;

    /// Lower-level display entry point tried once when `show` fails.
    fn show_fallback(&self, payload: &NotificationPayload) -> Result<(), PlatformError>;
}
