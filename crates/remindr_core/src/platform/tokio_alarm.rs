//! Alarm facility backed by tokio timers.
//!
//! Used by desktop hosts where no OS alarm service exists. Fired triggers are
//! sent over an unbounded channel as `DeliveryKind::Primary` events.
//!
//! # Invariants
//! - One armed timer per task id; re-registration aborts the previous timer.
//! - A timer only fires if it is still the armed one for its task id.
//! - Fired timers remove their own entry.

use crate::model::task::TaskId;
use crate::platform::alarm::{AlarmFacility, DeliveryKind, TriggerEvent, TriggerPayload};
use crate::platform::clock::Clock;
use crate::platform::PlatformError;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct ArmedTimer {
    generation: u64,
    fire_at_ms: i64,
    handle: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<TaskId, ArmedTimer>>>;

pub struct TokioAlarmFacility {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<TriggerEvent>,
    timers: TimerMap,
    next_generation: AtomicU64,
}

impl TokioAlarmFacility {
    pub fn new(
        runtime: Handle,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<TriggerEvent>,
    ) -> Self {
        Self {
            runtime,
            clock,
            events,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Creates a facility together with the receiver its triggers arrive on.
    pub fn channel(
        runtime: Handle,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<TriggerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(runtime, clock, tx), rx)
    }

    /// Armed triggers as `(task_id, fire_at_ms)`, sorted by task id.
    pub fn armed(&self) -> Vec<(TaskId, i64)> {
        let Ok(timers) = self.timers.lock() else {
            return Vec::new();
        };
        let mut armed: Vec<_> = timers
            .iter()
            .map(|(task_id, timer)| (*task_id, timer.fire_at_ms))
            .collect();
        armed.sort_unstable();
        armed
    }

    fn timers(&self) -> Result<MutexGuard<'_, HashMap<TaskId, ArmedTimer>>, PlatformError> {
        self.timers
            .lock()
            .map_err(|_| PlatformError::alarm("timer table lock poisoned"))
    }
}

impl AlarmFacility for TokioAlarmFacility {
    fn register_one_shot(
        &self,
        task_id: TaskId,
        fire_at_ms: i64,
        payload: &TriggerPayload,
    ) -> Result<(), PlatformError> {
        if self.events.is_closed() {
            return Err(PlatformError::alarm("trigger receiver has been dropped"));
        }

        let delay_ms = fire_at_ms.saturating_sub(self.clock.now_ms()).max(0);
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let event = TriggerEvent::from_payload(payload, DeliveryKind::Primary);
        let events = self.events.clone();
        let timers = Arc::clone(&self.timers);

        // Held across spawn so a zero-delay timer cannot fire before it is armed.
        let mut armed = self.timers()?;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let still_armed = match timers.lock() {
                Ok(mut timers) => match timers.get(&task_id) {
                    Some(timer) if timer.generation == generation => {
                        timers.remove(&task_id);
                        true
                    }
                    _ => false,
                },
                Err(_) => false,
            };
            if still_armed {
                debug!("event=alarm_fired module=platform task_id={task_id}");
                let _ = events.send(event);
            }
        });

        if let Some(previous) = armed.insert(
            task_id,
            ArmedTimer {
                generation,
                fire_at_ms,
                handle,
            },
        ) {
            previous.handle.abort();
        }
        Ok(())
    }

    fn cancel(&self, task_id: TaskId) -> Result<(), PlatformError> {
        if let Some(timer) = self.timers()?.remove(&task_id) {
            timer.handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TokioAlarmFacility;
    use crate::platform::alarm::{AlarmFacility, DeliveryKind, TriggerPayload};
    use crate::platform::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn payload(task_id: i64, reminder_at: i64) -> TriggerPayload {
        TriggerPayload {
            task_id,
            title: "Pay rent".to_string(),
            description: String::new(),
            reminder_at,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_the_requested_instant() {
        let clock = Arc::new(ManualClock::new(0));
        let (alarms, mut rx) = TokioAlarmFacility::channel(Handle::current(), clock);

        alarms
            .register_one_shot(7, 120_000, &payload(7, 120_000))
            .expect("register");
        assert_eq!(alarms.armed(), vec![(7, 120_000)]);

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(rx.try_recv().is_err());

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("trigger should fire")
            .expect("channel open");
        assert_eq!(event.task_id, Some(7));
        assert_eq!(event.kind, DeliveryKind::Primary);
        assert!(alarms.armed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn re_registration_replaces_previous_trigger() {
        let clock = Arc::new(ManualClock::new(0));
        let (alarms, mut rx) = TokioAlarmFacility::channel(Handle::current(), clock);

        alarms
            .register_one_shot(7, 1_000, &payload(7, 1_000))
            .expect("first register");
        alarms
            .register_one_shot(7, 5_000, &payload(7, 5_000))
            .expect("second register");
        assert_eq!(alarms.armed(), vec![(7, 5_000)]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let event = rx.recv().await.expect("one trigger");
        assert_eq!(event.reminder_at, Some(5_000));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_delivery_and_is_idempotent() {
        let clock = Arc::new(ManualClock::new(0));
        let (alarms, mut rx) = TokioAlarmFacility::channel(Handle::current(), clock);

        alarms
            .register_one_shot(7, 1_000, &payload(7, 1_000))
            .expect("register");
        alarms.cancel(7).expect("cancel");
        alarms.cancel(7).expect("second cancel");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(alarms.armed().is_empty());
    }

    #[tokio::test]
    async fn closed_receiver_fails_registration() {
        let clock = Arc::new(ManualClock::new(0));
        let (alarms, rx) = TokioAlarmFacility::channel(Handle::current(), clock);
        drop(rx);

        let err = alarms
            .register_one_shot(1, 10, &payload(1, 10))
            .expect_err("closed channel must fail");
        assert!(err.message.contains("dropped"));
    }
}
