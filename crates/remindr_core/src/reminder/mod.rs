//! Reminder scheduling and delivery.
//!
//! Flow: task mutation -> `ReminderScheduler` -> `AlarmFacility` -> trigger
//! -> `NotificationDispatcher` -> `NotificationSurface`. `BootRecovery`
//! rebuilds triggers after a restart.

pub mod boot;
pub mod dispatcher;
pub mod permission;
pub mod retry;
pub mod scheduler;
pub mod validity;
