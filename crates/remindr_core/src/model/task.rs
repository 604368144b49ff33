//! Task domain model.
//!
//! # Responsibility
//! - Define the task record persisted by the task store.
//! - Encode the "active reminder" rule shared by scheduler and boot recovery.
//!
//! # Invariants
//! - `id == 0` means the task has not been persisted yet.
//! - `title` must be non-empty after trimming.
//! - A completed task never holds an active reminder.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned task identifier.
pub type TaskId = i64;

/// Task importance used for list ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Every priority, most important first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Stable storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parses a storage/wire label; case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Sort rank, lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// Validation failures for task writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be empty"),
        }
    }
}

impl Error for TaskValidationError {}

/// One to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Calendar day the task is planned for.
    pub scheduled_date: NaiveDate,
    pub is_completed: bool,
    /// Reminder instant in epoch milliseconds; `None` means no reminder.
    pub reminder_at: Option<i64>,
}

impl Task {
    /// Creates an unsaved task with empty description and no reminder.
    pub fn new(
        title: impl Into<String>,
        priority: Priority,
        scheduled_date: NaiveDate,
        created_at: i64,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: String::new(),
            priority,
            created_at,
            scheduled_date,
            is_completed: false,
            reminder_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reminder(mut self, reminder_at: Option<i64>) -> Self {
        self.reminder_at = reminder_at;
        self
    }

    /// Returns whether the store has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Checks write-time invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Returns whether this task should hold a registered reminder at `now_ms`.
    ///
    /// Active means: reminder present, not completed, reminder strictly after `now_ms`.
    pub fn has_active_reminder(&self, now_ms: i64) -> bool {
        !self.is_completed && self.reminder_at.is_some_and(|at| at > now_ms)
    }
}
