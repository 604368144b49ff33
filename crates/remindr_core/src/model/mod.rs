//! Domain model for tasks and their reminders.
//!
//! # Responsibility
//! - Define the records shared by the task store and the reminder subsystem.
//!
//! # Invariants
//! - Reminder code treats `Task` as an immutable snapshot per operation.

pub mod task;
