//! Trigger handling and notification display.
//!
//! # Responsibility
//! - Decide, per fired trigger, whether a reminder is still worth showing.
//! - Build the notification content and hand it to the OS.
//! - Own the "already shown" de-dup flags.
//!
//! # Invariants
//! - A live task that is completed or past the grace window is never shown.
//! - Snapshot data is used only when the live task cannot be read.
//! - Backup deliveries claim the de-dup flag atomically before display, so two
//!   concurrent backups for one task cannot both show.
//! - Previews never read or write de-dup flags.
//! - The wake lock is released on every exit path.

use crate::config::ReminderConfig;
use crate::model::task::{Task, TaskId};
use crate::platform::alarm::{DeliveryKind, TriggerEvent, ACTION_SHOW_REMINDER};
use crate::platform::clock::Clock;
use crate::platform::notify::{NotificationPayload, NotificationSurface, REMINDER_CHANNEL_ID};
use crate::platform::wake_lock::{WakeLockGuard, WakeLockProvider};
use crate::reminder::permission::PermissionGate;
use crate::reminder::validity::{delivery_flag_key, is_displayable};
use crate::repo::preference_repo::PreferenceStore;
use crate::repo::task_repo::TaskRepository;
use log::{debug, error, info, warn};
use std::sync::Arc;

const EMPTY_BODY_PLACEHOLDER: &str = "Pending task";
const NOTIFICATION_SUMMARY: &str = "Task reminder";

/// Why a valid trigger ended without a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Live task completed/stale, or missing with no usable snapshot.
    NothingToShow,
    PermissionDenied,
    /// Both display entry points failed.
    DisplayFailed,
}

impl AbandonReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NothingToShow => "nothing_to_show",
            Self::PermissionDenied => "permission_denied",
            Self::DisplayFailed => "display_failed",
        }
    }
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Malformed trigger (wrong action or missing id).
    Dropped,
    /// Already delivered in this scheduling cycle.
    Suppressed,
    Abandoned(AbandonReason),
    Shown { via_fallback: bool },
}

impl DispatchOutcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dropped => "dropped",
            Self::Suppressed => "suppressed",
            Self::Abandoned(reason) => reason.as_str(),
            Self::Shown { via_fallback: false } => "shown",
            Self::Shown { via_fallback: true } => "shown_fallback",
        }
    }

    pub fn is_shown(self) -> bool {
        matches!(self, Self::Shown { .. })
    }
}

/// Text chosen for display, from the live task or the trigger snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReminderContent {
    task_id: TaskId,
    title: String,
    description: String,
}

impl ReminderContent {
    fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
        }
    }

    fn from_snapshot(task_id: TaskId, event: &TriggerEvent) -> Option<Self> {
        let title = event.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            task_id,
            title: title.to_string(),
            description: event.description.clone(),
        })
    }

    fn styled(self, kind: DeliveryKind) -> Self {
        match kind {
            DeliveryKind::Primary => self,
            DeliveryKind::Backup => Self {
                title: format!("{} (reminder)", self.title),
                description: format!("Don't forget this task! {}", self.description)
                    .trim_end()
                    .to_string(),
                ..self
            },
            DeliveryKind::Preview => Self {
                title: format!("{} (preview)", self.title),
                ..self
            },
        }
    }

    fn into_payload(self) -> NotificationPayload {
        let body = if self.description.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER.to_string()
        } else {
            self.description
        };
        NotificationPayload {
            notification_id: self.task_id,
            channel_id: REMINDER_CHANNEL_ID.to_string(),
            title: self.title,
            body,
            summary: NOTIFICATION_SUMMARY.to_string(),
            open_task_id: self.task_id,
        }
    }
}

/// Handles fired triggers end to end.
pub struct NotificationDispatcher {
    store: Arc<dyn TaskRepository>,
    flags: Arc<dyn PreferenceStore>,
    notifier: Arc<dyn NotificationSurface>,
    permission: Arc<dyn PermissionGate>,
    wake_locks: Arc<dyn WakeLockProvider>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn TaskRepository>,
        flags: Arc<dyn PreferenceStore>,
        notifier: Arc<dyn NotificationSurface>,
        permission: Arc<dyn PermissionGate>,
        wake_locks: Arc<dyn WakeLockProvider>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            flags,
            notifier,
            permission,
            wake_locks,
            clock,
            config,
        }
    }

    /// Processes one trigger. Never fails; the outcome is for logging/tests.
    pub async fn dispatch(&self, event: TriggerEvent) -> DispatchOutcome {
        let Some(task_id) = validated_task_id(&event) else {
            debug!(
                "event=reminder_dispatch module=reminder status=dropped action={}",
                event.action
            );
            return DispatchOutcome::Dropped;
        };

        if event.kind == DeliveryKind::Backup && self.was_delivered(task_id) {
            info!(
                "event=reminder_dispatch module=reminder status=suppressed task_id={task_id} kind=backup"
            );
            return DispatchOutcome::Suppressed;
        }

        let _wake_lock =
            WakeLockGuard::acquire(self.wake_locks.as_ref(), self.config.wake_lock_timeout());
        let outcome = self.process(task_id, &event).await;
        info!(
            "event=reminder_dispatch module=reminder status={} task_id={task_id} kind={}",
            outcome.label(),
            event.kind.as_str()
        );
        outcome
    }

    /// Returns whether a non-preview notification was shown this cycle.
    ///
    /// Read failures count as "not shown".
    pub fn was_delivered(&self, task_id: TaskId) -> bool {
        match self.flags.get_bool(&delivery_flag_key(task_id)) {
            Ok(shown) => shown,
            Err(err) => {
                error!(
                    "event=delivery_flag_read module=reminder status=error task_id={task_id} error={err}"
                );
                false
            }
        }
    }

    /// Clears the de-dup flag so the next cycle can deliver again.
    pub fn forget_delivery(&self, task_id: TaskId) {
        if let Err(err) = self.flags.remove(&delivery_flag_key(task_id)) {
            error!(
                "event=delivery_flag_clear module=reminder status=error task_id={task_id} error={err}"
            );
        }
    }

    pub fn notifications_permitted(&self) -> bool {
        self.permission.notifications_permitted()
    }

    async fn process(&self, task_id: TaskId, event: &TriggerEvent) -> DispatchOutcome {
        let Some(content) = self.resolve(task_id, event).await else {
            return DispatchOutcome::Abandoned(AbandonReason::NothingToShow);
        };

        if !self.permission.notifications_permitted() {
            return DispatchOutcome::Abandoned(AbandonReason::PermissionDenied);
        }

        if event.kind == DeliveryKind::Backup && !self.claim_delivery(task_id) {
            return DispatchOutcome::Suppressed;
        }

        let payload = content.styled(event.kind).into_payload();
        match self.display(&payload) {
            Some(via_fallback) => {
                if event.kind == DeliveryKind::Primary {
                    self.mark_delivered(task_id);
                }
                DispatchOutcome::Shown { via_fallback }
            }
            None => {
                if event.kind == DeliveryKind::Backup {
                    self.forget_delivery(task_id);
                }
                DispatchOutcome::Abandoned(AbandonReason::DisplayFailed)
            }
        }
    }

    async fn resolve(&self, task_id: TaskId, event: &TriggerEvent) -> Option<ReminderContent> {
        match self.load_task(task_id).await {
            Ok(Some(task)) => {
                let now = self.clock.now_ms();
                if is_displayable(&task, now, self.config.display_grace_ms_i64()) {
                    Some(ReminderContent::from_task(&task))
                } else {
                    debug!(
                        "event=reminder_resolve module=reminder status=stale task_id={task_id} completed={}",
                        task.is_completed
                    );
                    None
                }
            }
            Ok(None) => {
                debug!("event=reminder_resolve module=reminder status=missing task_id={task_id}");
                ReminderContent::from_snapshot(task_id, event)
            }
            Err(message) => {
                warn!(
                    "event=reminder_resolve module=reminder status=error task_id={task_id} error={message}"
                );
                ReminderContent::from_snapshot(task_id, event)
            }
        }
    }

    async fn load_task(&self, task_id: TaskId) -> Result<Option<Task>, String> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.get_task(task_id)).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(err) => Err(format!("store read task failed: {err}")),
        }
    }

    /// Returns `Some(via_fallback)` on success.
    fn display(&self, payload: &NotificationPayload) -> Option<bool> {
        let primary_err = match self.notifier.show(payload) {
            Ok(()) => return Some(false),
            Err(err) => err,
        };
        warn!(
            "event=notification_show module=reminder status=error path=primary task_id={} error={}",
            payload.notification_id, primary_err
        );

        match self.notifier.show_fallback(payload) {
            Ok(()) => Some(true),
            Err(err) => {
                error!(
                    "event=notification_show module=reminder status=error path=fallback task_id={} error={}",
                    payload.notification_id, err
                );
                None
            }
        }
    }

    fn claim_delivery(&self, task_id: TaskId) -> bool {
        match self
            .flags
            .compare_and_set_bool(&delivery_flag_key(task_id), false, true)
        {
            Ok(claimed) => claimed,
            Err(err) => {
                // Unreadable flag store: prefer a possible duplicate over a lost reminder.
                error!(
                    "event=delivery_flag_claim module=reminder status=error task_id={task_id} error={err}"
                );
                true
            }
        }
    }

    fn mark_delivered(&self, task_id: TaskId) {
        if let Err(err) = self.flags.set_bool(&delivery_flag_key(task_id), true) {
            error!(
                "event=delivery_flag_write module=reminder status=error task_id={task_id} error={err}"
            );
        }
    }
}

fn validated_task_id(event: &TriggerEvent) -> Option<TaskId> {
    if event.action != ACTION_SHOW_REMINDER {
        return None;
    }
    event.task_id.filter(|id| *id > 0)
}
