//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the task store and preference store seams used by reminders.
//! - Isolate SQL from scheduling and service orchestration.
//!
//! # Invariants
//! - Task writes enforce `Task::validate()` before persistence.
//! - Store traits are `Send + Sync` so they can cross into background workers.

pub mod preference_repo;
pub mod task_repo;
