//! Time-window rules shared by scheduler, dispatcher and boot recovery.

use crate::model::task::{Task, TaskId};

const DELIVERY_FLAG_PREFIX: &str = "notification_shown_";

/// Whether a reminder at `reminder_at` may still be displayed at `now_ms`.
///
/// Future reminders are valid; past ones stay valid for `grace_ms` (inclusive)
/// to absorb delayed wake-ups.
pub fn is_within_display_window(reminder_at: i64, now_ms: i64, grace_ms: i64) -> bool {
    reminder_at > now_ms || now_ms.saturating_sub(reminder_at) <= grace_ms
}

/// Whether a live task's reminder should still be shown.
pub fn is_displayable(task: &Task, now_ms: i64, grace_ms: i64) -> bool {
    !task.is_completed
        && task
            .reminder_at
            .is_some_and(|at| is_within_display_window(at, now_ms, grace_ms))
}

/// Whether `reminder_at` is in the future but no further than `window_ms` away.
pub fn is_due_soon(reminder_at: Option<i64>, now_ms: i64, window_ms: i64) -> bool {
    reminder_at.is_some_and(|at| at > now_ms && at - now_ms < window_ms)
}

/// Preference key holding the "already shown" flag for one task.
pub fn delivery_flag_key(task_id: TaskId) -> String {
    format!("{DELIVERY_FLAG_PREFIX}{task_id}")
}
