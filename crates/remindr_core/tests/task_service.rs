mod common;

use common::{day, Harness, MINUTE, NOW};
use remindr_core::{
    AbandonReason, DeliveryKind, DispatchOutcome, NewTask, PreferenceStore, Priority,
    ReminderConfig, TaskServiceError, TaskValidationError, TriggerEvent,
};
use std::time::{Duration, Instant};

fn new_task(title: &str, reminder_at: Option<i64>) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: String::new(),
        priority: Priority::High,
        scheduled_date: day(),
        reminder_at,
    }
}

#[tokio::test(start_paused = true)]
async fn add_task_persists_and_registers_reminder() {
    let h = Harness::new();
    let service = h.service();

    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 2 * MINUTE)))
        .await
        .unwrap();

    assert!(task.id > 0);
    assert_eq!(task.created_at, NOW);
    assert_eq!(h.alarms.armed_ids(), vec![task.id]);
    assert_eq!(service.get_task(task.id).unwrap(), Some(task));
}

#[tokio::test(start_paused = true)]
async fn blank_title_is_a_validation_error() {
    let h = Harness::new();
    let service = h.service();

    let err = service.add_task(new_task("   ", None)).await.unwrap_err();

    assert!(matches!(
        err,
        TaskServiceError::Validation(TaskValidationError::EmptyTitle)
    ));
    assert!(service.list_tasks().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completing_before_fire_cancels_and_nothing_is_shown() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 2 * MINUTE)))
        .await
        .unwrap();
    let payload = h.alarms.armed(task.id).unwrap();

    let done = service.set_completed(task.id, true).await.unwrap();

    assert!(done.is_completed);
    assert!(h.alarms.armed(task.id).is_none());

    // A trigger already in flight still finds the task completed.
    h.clock.set(NOW + 2 * MINUTE);
    let outcome = h
        .dispatcher
        .dispatch(TriggerEvent::from_payload(&payload, DeliveryKind::Primary))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Abandoned(AbandonReason::NothingToShow)
    );
    assert_eq!(h.notifier.display_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn reopening_a_task_registers_its_future_reminder_again() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 30 * MINUTE)))
        .await
        .unwrap();

    service.set_completed(task.id, true).await.unwrap();
    service.set_completed(task.id, false).await.unwrap();

    assert_eq!(h.alarms.armed_ids(), vec![task.id]);
}

#[tokio::test(start_paused = true)]
async fn editing_reminder_after_delivery_clears_shown_flag() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + MINUTE)))
        .await
        .unwrap();
    h.flags
        .set_bool(&format!("notification_shown_{}", task.id), true)
        .unwrap();

    let moved = service
        .set_reminder(task.id, Some(NOW + 90 * MINUTE))
        .await
        .unwrap();

    assert_eq!(moved.reminder_at, Some(NOW + 90 * MINUTE));
    assert!(!h.flag_set(task.id));
    assert_eq!(
        h.alarms.armed(task.id).unwrap().reminder_at,
        NOW + 90 * MINUTE
    );
}

#[tokio::test(start_paused = true)]
async fn clearing_reminder_removes_trigger() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + MINUTE)))
        .await
        .unwrap();

    service.set_reminder(task.id, None).await.unwrap();

    assert!(h.alarms.armed_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn update_task_refreshes_trigger_snapshot() {
    let h = Harness::new();
    let service = h.service();
    let mut task = service
        .add_task(new_task("Pay rent", Some(NOW + MINUTE)))
        .await
        .unwrap();

    task.title = "Pay rent and water".to_string();
    task.description = "transfer both".to_string();
    service.update_task(task.clone()).await.unwrap();

    let payload = h.alarms.armed(task.id).unwrap();
    assert_eq!(payload.title, "Pay rent and water");
    assert_eq!(payload.description, "transfer both");
}

#[tokio::test(start_paused = true)]
async fn delete_cancels_and_restore_brings_reminder_back() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + MINUTE)))
        .await
        .unwrap();

    let deleted = service.delete_task(task.id).await.unwrap();
    assert_eq!(deleted, task);
    assert!(h.alarms.armed_ids().is_empty());
    assert!(service.get_task(task.id).unwrap().is_none());

    let restored = service.restore_task(deleted).await.unwrap();
    assert_ne!(restored.id, task.id);
    assert_eq!(restored.created_at, task.created_at);
    assert_eq!(h.alarms.armed_ids(), vec![restored.id]);
}

#[tokio::test(start_paused = true)]
async fn operations_on_missing_tasks_return_not_found() {
    let h = Harness::new();
    let service = h.service();

    assert!(matches!(
        service.set_completed(404, true).await,
        Err(TaskServiceError::TaskNotFound(404))
    ));
    assert!(matches!(
        service.delete_task(404).await,
        Err(TaskServiceError::TaskNotFound(404))
    ));
    assert!(matches!(
        service.preview_notification(404).await,
        Err(TaskServiceError::TaskNotFound(404))
    ));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_ordered_snapshots_after_mutations() {
    let h = Harness::new();
    let service = h.service();
    let mut rx = service.subscribe();
    assert!(rx.borrow_and_update().is_empty());

    service.add_task(new_task("Pay rent", None)).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update()[0].title, "Pay rent");

    let mut low = new_task("Water plants", None);
    low.priority = Priority::Low;
    service.add_task(low).await.unwrap();
    let titles: Vec<String> = rx
        .borrow_and_update()
        .iter()
        .map(|task| task.title.clone())
        .collect();
    assert_eq!(titles, vec!["Pay rent", "Water plants"]);
}

#[tokio::test(start_paused = true)]
async fn grouping_and_dates_follow_scheduled_date() {
    let h = Harness::new();
    let service = h.service();
    let mut later = new_task("Dentist", None);
    later.scheduled_date = day().succ_opt().unwrap();
    service.add_task(new_task("Pay rent", None)).await.unwrap();
    service.add_task(later).await.unwrap();

    let groups = service.tasks_grouped_by_date().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].date, day());
    assert_eq!(groups[1].tasks[0].title, "Dentist");
    assert_eq!(service.tasks_for_date(day()).unwrap().len(), 1);
    assert_eq!(service.task_dates(day()).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn preview_shows_without_marking_delivered() {
    let h = Harness::new();
    let service = h.service();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + MINUTE)))
        .await
        .unwrap();

    let outcome = service.preview_notification(task.id).await.unwrap();

    assert!(outcome.is_shown());
    assert!(!h.flag_set(task.id));
    assert!(service.notifications_permitted());
}

#[tokio::test]
async fn failing_alarm_registration_does_not_hold_up_add() {
    let h = Harness::with_config(ReminderConfig {
        registration_retry_delay_ms: 600_000,
        ..ReminderConfig::default()
    });
    let service = h.service();
    h.alarms.fail_next(1);

    let started = Instant::now();
    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 2 * MINUTE)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(h.alarms.register_calls(), 1);
    assert!(h.alarms.armed_ids().is_empty());
    assert_eq!(service.get_task(task.id).unwrap(), Some(task));
}

#[tokio::test(start_paused = true)]
async fn background_retry_registers_after_add_returns() {
    let h = Harness::new();
    let service = h.service();
    h.alarms.fail_next(1);

    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 2 * MINUTE)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.alarms.armed_ids(), vec![task.id]);
    assert_eq!(h.alarms.register_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn deleting_while_registration_retries_leaves_nothing_armed() {
    let h = Harness::new();
    let service = h.service();
    h.alarms.fail_next(1);

    let task = service
        .add_task(new_task("Pay rent", Some(NOW + 2 * MINUTE)))
        .await
        .unwrap();
    service.delete_task(task.id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(h.alarms.armed_ids().is_empty());
    assert_eq!(h.notifier.display_attempts(), 0);
}
