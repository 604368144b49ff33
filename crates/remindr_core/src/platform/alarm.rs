//! One-shot alarm registration and the trigger data it carries.
//!
//! # Invariants
//! - At most one trigger exists per task id; registering again replaces it.
//! - `cancel` of an unknown id succeeds.

use crate::model::task::{Task, TaskId};
use crate::platform::PlatformError;
use serde::{Deserialize, Serialize};

/// Action name carried by reminder triggers.
pub const ACTION_SHOW_REMINDER: &str = "remindr.action.SHOW_REMINDER";

/// Task snapshot registered with the alarm so delivery can proceed even when
/// the store read fails at fire time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub reminder_at: i64,
}

impl TriggerPayload {
    /// Returns `None` when the task has no reminder instant.
    pub fn from_task(task: &Task) -> Option<Self> {
        Some(Self {
            task_id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            reminder_at: task.reminder_at?,
        })
    }
}

/// Why a trigger is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    /// The registered alarm fired (or the scheduler's immediate fallback).
    #[default]
    Primary,
    /// A secondary attempt for a reminder that may already have been shown.
    Backup,
    /// An on-demand preview; never recorded as delivered.
    Preview,
}

impl DeliveryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
            Self::Preview => "preview",
        }
    }
}

/// Trigger as handed back by the host when an alarm fires.
///
/// Fields are optional because hosts may lose extras in transit; the
/// dispatcher validates before acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub action: String,
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub kind: DeliveryKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reminder_at: Option<i64>,
}

impl TriggerEvent {
    pub fn from_payload(payload: &TriggerPayload, kind: DeliveryKind) -> Self {
        Self {
            action: ACTION_SHOW_REMINDER.to_string(),
            task_id: Some(payload.task_id),
            kind,
            title: Some(payload.title.clone()),
            description: payload.description.clone(),
            reminder_at: Some(payload.reminder_at),
        }
    }

    /// Builds an event straight from a task, bypassing any alarm.
    pub fn for_task(task: &Task, kind: DeliveryKind) -> Self {
        Self {
            action: ACTION_SHOW_REMINDER.to_string(),
            task_id: Some(task.id),
            kind,
            title: Some(task.title.clone()),
            description: task.description.clone(),
            reminder_at: task.reminder_at,
        }
    }
}

/// OS facility that wakes the process at a given instant.
pub trait AlarmFacility: Send + Sync {
    /// Registers (or replaces) the trigger for `task_id`, firing at
    /// `fire_at_ms` even when the device is idle.
    fn register_one_shot(
        &self,
        task_id: TaskId,
        fire_at_ms: i64,
        payload: &TriggerPayload,
    ) -> Result<(), PlatformError>;

    fn cancel(&self, task_id: TaskId) -> Result<(), PlatformError>;
}
