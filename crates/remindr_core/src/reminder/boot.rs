//! Re-registration of reminder triggers after a device restart.
//!
//! # Responsibility
//! - Recognize restart signals, including vendor quick-boot variants.
//! - Re-schedule every open task whose reminder is still ahead.
//!
//! # Invariants
//! - A store read failure yields an empty batch, never a panic.
//! - One task failing to schedule never stops the rest of the batch.
//! - Registrations are issued one at a time with a short pause between them.

use crate::config::ReminderConfig;
use crate::model::task::Task;
use crate::platform::clock::Clock;
use crate::reminder::scheduler::{ReminderScheduler, ScheduleOutcome};
use crate::repo::task_repo::TaskRepository;
use log::{debug, error, info};
use std::sync::Arc;

/// Restart signals that trigger recovery.
pub const BOOT_ACTIONS: [&str; 3] = [
    "android.intent.action.BOOT_COMPLETED",
    "android.intent.action.QUICKBOOT_POWERON",
    "com.htc.intent.action.QUICKBOOT_POWERON",
];

pub fn is_boot_signal(action: &str) -> bool {
    BOOT_ACTIONS.contains(&action)
}

/// Summary of one recovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootRecoveryReport {
    /// Tasks read from the store.
    pub total: usize,
    /// Tasks with an active reminder at read time.
    pub pending: usize,
    pub registered: usize,
    pub failed: usize,
    /// Reminders that passed while the batch was running.
    pub skipped: usize,
}

pub struct BootRecovery {
    store: Arc<dyn TaskRepository>,
    scheduler: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
}

impl BootRecovery {
    pub fn new(
        store: Arc<dyn TaskRepository>,
        scheduler: Arc<ReminderScheduler>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            config,
        }
    }

    /// Runs recovery for restart signals; other actions are ignored.
    pub async fn on_signal(&self, action: &str) -> Option<BootRecoveryReport> {
        if !is_boot_signal(action) {
            debug!("event=boot_recovery module=reminder status=ignored action={action}");
            return None;
        }
        Some(self.run().await)
    }

    pub async fn run(&self) -> BootRecoveryReport {
        info!("event=boot_recovery module=reminder status=start");
        tokio::time::sleep(self.config.boot_grace_delay()).await;

        let tasks = self.load_tasks().await;
        let now_ms = self.clock.now_ms();
        let pending: Vec<&Task> = tasks
            .iter()
            .filter(|task| task.has_active_reminder(now_ms))
            .collect();

        let mut report = BootRecoveryReport {
            total: tasks.len(),
            pending: pending.len(),
            ..BootRecoveryReport::default()
        };

        for (index, task) in pending.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.boot_inter_task_delay()).await;
            }
            match self.scheduler.schedule(task).await {
                ScheduleOutcome::Registered { .. } => report.registered += 1,
                ScheduleOutcome::Abandoned { .. } => report.failed += 1,
                ScheduleOutcome::Skipped(_) => report.skipped += 1,
            }
        }

        info!(
            "event=boot_recovery module=reminder status=done total={} pending={} registered={} failed={} skipped={}",
            report.total, report.pending, report.registered, report.failed, report.skipped
        );
        report
    }

    async fn load_tasks(&self) -> Vec<Task> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.list_tasks()).await {
            Ok(Ok(tasks)) => tasks,
            Ok(Err(err)) => {
                error!("event=boot_recovery_read module=reminder status=error error={err}");
                Vec::new()
            }
            Err(err) => {
                error!("event=boot_recovery_read module=reminder status=error error={err}");
                Vec::new()
            }
        }
    }
}
