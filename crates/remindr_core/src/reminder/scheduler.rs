//! Reminder trigger registration.
//!
//! # Responsibility
//! - Turn a task's reminder instant into a one-shot OS alarm.
//! - Retry transient registration failures on a fixed delay.
//! - Fall back to an immediate display when registration fails close to the
//!   deadline.
//!
//! # Invariants
//! - Only active reminders of persisted tasks are registered.
//! - `cancel` never fails and always clears the de-dup flag.
//! - `cancel` supersedes every `schedule` already in flight for the task: a
//!   registration attempt or immediate display that starts after the cancel
//!   does nothing.
//! - `reschedule` cancels fully before registering again.
//! - Nothing here returns an error to the caller; outcomes are informational.

use crate::config::ReminderConfig;
use crate::model::task::{Task, TaskId};
use crate::platform::alarm::{AlarmFacility, DeliveryKind, TriggerEvent, TriggerPayload};
use crate::platform::clock::Clock;
use crate::platform::PlatformError;
use crate::reminder::dispatcher::{AbandonReason, DispatchOutcome, NotificationDispatcher};
use crate::reminder::retry::{retry_fixed, RetryExhausted, RetryPolicy};
use crate::reminder::validity::is_due_soon;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Why `schedule` registered nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoReminder,
    Completed,
    InThePast,
    NotPersisted,
    /// `cancel` ran for the task while registration was still pending.
    Cancelled,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoReminder => "no_reminder",
            Self::Completed => "completed",
            Self::InThePast => "in_the_past",
            Self::NotPersisted => "not_persisted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of one `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Skipped(SkipReason),
    Registered { attempts: u32 },
    /// Every attempt failed. `immediate` holds the fallback dispatch result
    /// when the reminder was close enough to show right away.
    Abandoned {
        attempts: u32,
        immediate: Option<DispatchOutcome>,
    },
}

impl ScheduleOutcome {
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

type Registration = Result<(bool, u32), RetryExhausted<PlatformError>>;

pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmFacility>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
    /// Bumped by `cancel`; a pending registration only proceeds while the
    /// generation it started with is still current.
    generations: Mutex<HashMap<TaskId, u64>>,
}

impl ReminderScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmFacility>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            alarms,
            dispatcher,
            clock,
            config,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the task's reminder trigger, or does nothing when the task
    /// holds no active reminder.
    ///
    /// Waits out registration retries; see `reschedule_detached` for the
    /// variant that does not.
    pub async fn schedule(&self, task: &Task) -> ScheduleOutcome {
        let generation = self.generation(task.id);
        let payload = match self.payload_for(task) {
            Ok(payload) => payload,
            Err(reason) => return ScheduleOutcome::Skipped(reason),
        };

        let registration = retry_fixed(self.retry_policy(), "alarm_register", |_| {
            self.register_if_current(&payload, generation)
        })
        .await;
        self.conclude(&payload, generation, registration).await
    }

    /// Removes any trigger for `task_id` and clears its de-dup flag.
    ///
    /// Registrations still retrying for the task give up.
    pub fn cancel(&self, task_id: TaskId) {
        *self.lock_generations().entry(task_id).or_insert(0) += 1;
        match self.alarms.cancel(task_id) {
            Ok(()) => debug!("event=reminder_cancel module=reminder status=ok task_id={task_id}"),
            Err(err) => warn!(
                "event=reminder_cancel module=reminder status=error task_id={task_id} error={err}"
            ),
        }
        self.dispatcher.forget_delivery(task_id);
    }

    /// `cancel` followed by `schedule`.
    pub async fn reschedule(&self, task: &Task) -> ScheduleOutcome {
        self.cancel(task.id);
        self.schedule(task).await
    }

    /// `cancel`, then one registration attempt inline.
    ///
    /// # Contract
    /// - Returns `None` when the outcome is settled before returning
    ///   (registered, or nothing to register).
    /// - When the first attempt fails, the remaining retries and any immediate
    ///   fallback run on a spawned task whose handle is returned. Must be
    ///   called from within a tokio runtime.
    pub fn reschedule_detached(
        self: &Arc<Self>,
        task: &Task,
    ) -> Option<JoinHandle<ScheduleOutcome>> {
        self.cancel(task.id);
        let generation = self.generation(task.id);
        let payload = self.payload_for(task).ok()?;

        let first_error = match self.register_if_current(&payload, generation) {
            Ok(true) => {
                log_registered(&payload, 1);
                return None;
            }
            Ok(false) => return None,
            Err(err) => err,
        };
        warn!(
            "event=retry_attempt module=reminder op=alarm_register status=error attempt=1 max_attempts={} error={first_error}",
            self.config.max_registration_attempts
        );

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let registration = scheduler.retry_remaining(&payload, generation, first_error).await;
            scheduler.conclude(&payload, generation, registration).await
        }))
    }

    fn payload_for(&self, task: &Task) -> Result<TriggerPayload, SkipReason> {
        schedulable_payload(task, self.clock.now_ms()).map_err(|reason| {
            debug!(
                "event=reminder_schedule module=reminder status=skipped task_id={} reason={}",
                task.id,
                reason.as_str()
            );
            reason
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.max_registration_attempts,
            self.config.registration_retry_delay(),
        )
    }

    /// Attempts 2..=max after the first attempt failed inline.
    async fn retry_remaining(
        &self,
        payload: &TriggerPayload,
        generation: u64,
        first_error: PlatformError,
    ) -> Registration {
        let policy = self.retry_policy();
        if policy.max_attempts <= 1 {
            return Err(RetryExhausted {
                attempts: 1,
                last_error: first_error,
            });
        }

        tokio::time::sleep(policy.delay).await;
        let remaining = RetryPolicy::new(policy.max_attempts - 1, policy.delay);
        retry_fixed(remaining, "alarm_register", |_| {
            self.register_if_current(payload, generation)
        })
        .await
        .map(|(registered, attempts)| (registered, attempts + 1))
        .map_err(|exhausted| RetryExhausted {
            attempts: exhausted.attempts + 1,
            last_error: exhausted.last_error,
        })
    }

    async fn conclude(
        &self,
        payload: &TriggerPayload,
        generation: u64,
        registration: Registration,
    ) -> ScheduleOutcome {
        match registration {
            Ok((true, attempts)) => {
                log_registered(payload, attempts);
                ScheduleOutcome::Registered { attempts }
            }
            Ok((false, _)) => self.superseded(payload.task_id),
            Err(_) if !self.is_current(payload.task_id, generation) => {
                self.superseded(payload.task_id)
            }
            Err(exhausted) => {
                error!(
                    "event=reminder_schedule module=reminder status=abandoned task_id={} attempts={} error={}",
                    payload.task_id, exhausted.attempts, exhausted.last_error
                );
                let immediate = self.dispatch_if_due_soon(payload, generation).await;
                ScheduleOutcome::Abandoned {
                    attempts: exhausted.attempts,
                    immediate,
                }
            }
        }
    }

    /// Registers unless `cancel` ran since `generation` was read. The
    /// generation lock is held across the OS call so a concurrent `cancel`
    /// either prevents the registration or removes it afterwards.
    fn register_if_current(
        &self,
        payload: &TriggerPayload,
        generation: u64,
    ) -> Result<bool, PlatformError> {
        let generations = self.lock_generations();
        if current_generation(&generations, payload.task_id) != generation {
            return Ok(false);
        }
        self.alarms
            .register_one_shot(payload.task_id, payload.reminder_at, payload)?;
        Ok(true)
    }

    fn superseded(&self, task_id: TaskId) -> ScheduleOutcome {
        info!(
            "event=reminder_schedule module=reminder status=skipped task_id={task_id} reason={}",
            SkipReason::Cancelled.as_str()
        );
        ScheduleOutcome::Skipped(SkipReason::Cancelled)
    }

    fn generation(&self, task_id: TaskId) -> u64 {
        current_generation(&self.lock_generations(), task_id)
    }

    fn is_current(&self, task_id: TaskId, generation: u64) -> bool {
        self.generation(task_id) == generation
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<TaskId, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch_if_due_soon(
        &self,
        payload: &TriggerPayload,
        generation: u64,
    ) -> Option<DispatchOutcome> {
        let now_ms = self.clock.now_ms();
        if !is_due_soon(
            Some(payload.reminder_at),
            now_ms,
            self.config.immediate_fallback_window_ms_i64(),
        ) {
            return None;
        }
        if !self.is_current(payload.task_id, generation) {
            return None;
        }
        if !self.dispatcher.notifications_permitted() {
            info!(
                "event=reminder_immediate module=reminder status=permission_denied task_id={}",
                payload.task_id
            );
            return Some(DispatchOutcome::Abandoned(AbandonReason::PermissionDenied));
        }

        info!(
            "event=reminder_immediate module=reminder status=start task_id={}",
            payload.task_id
        );
        let event = TriggerEvent::from_payload(payload, DeliveryKind::Primary);
        Some(self.dispatcher.dispatch(event).await)
    }
}

fn current_generation(generations: &HashMap<TaskId, u64>, task_id: TaskId) -> u64 {
    generations.get(&task_id).copied().unwrap_or(0)
}

fn log_registered(payload: &TriggerPayload, attempts: u32) {
    info!(
        "event=reminder_schedule module=reminder status=registered task_id={} fire_at_ms={} attempts={attempts}",
        payload.task_id, payload.reminder_at
    );
}

fn schedulable_payload(task: &Task, now_ms: i64) -> Result<TriggerPayload, SkipReason> {
    let payload = TriggerPayload::from_task(task).ok_or(SkipReason::NoReminder)?;
    if task.is_completed {
        return Err(SkipReason::Completed);
    }
    if payload.reminder_at <= now_ms {
        return Err(SkipReason::InThePast);
    }
    if !task.is_persisted() {
        return Err(SkipReason::NotPersisted);
    }
    Ok(payload)
}
