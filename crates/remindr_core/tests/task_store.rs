use chrono::NaiveDate;
use remindr_core::{
    open_db_in_memory, Priority, RepoError, SqliteTaskRepository, Task, TaskRepository,
    TaskValidationError,
};

fn repo() -> SqliteTaskRepository {
    SqliteTaskRepository::new(open_db_in_memory().unwrap())
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.title.as_str()).collect()
}

#[test]
fn create_assigns_ids_and_reads_back_all_fields() {
    let repo = repo();
    let task = Task::new("Pay rent", Priority::High, day(14), 1_000)
        .with_description("before noon")
        .with_reminder(Some(5_000));

    let id = repo.create_task(&task).unwrap();
    assert!(id > 0);

    let loaded = repo.get_task(id).unwrap().unwrap();
    assert_eq!(loaded, Task { id, ..task });
    assert!(repo.get_task(id + 1).unwrap().is_none());
}

#[test]
fn blank_title_is_rejected_before_sql() {
    let repo = repo();
    let err = repo
        .create_task(&Task::new("  ", Priority::Low, day(14), 0))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TaskValidationError::EmptyTitle)
    ));
}

#[test]
fn list_orders_by_date_priority_completion_then_newest() {
    let repo = repo();
    repo.create_task(&Task::new("later low", Priority::Low, day(15), 1))
        .unwrap();
    repo.create_task(&Task::new("today low", Priority::Low, day(14), 1))
        .unwrap();
    let done_id = repo
        .create_task(&Task::new("today high done", Priority::High, day(14), 9))
        .unwrap();
    repo.update_status(done_id, true).unwrap();
    repo.create_task(&Task::new("today high old", Priority::High, day(14), 1))
        .unwrap();
    repo.create_task(&Task::new("today high new", Priority::High, day(14), 5))
        .unwrap();

    let tasks = repo.list_tasks().unwrap();
    assert_eq!(
        titles(&tasks),
        vec![
            "today high new",
            "today high old",
            "today high done",
            "today low",
            "later low",
        ]
    );
}

#[test]
fn list_by_date_orders_by_priority_then_newest() {
    let repo = repo();
    repo.create_task(&Task::new("medium", Priority::Medium, day(14), 1))
        .unwrap();
    repo.create_task(&Task::new("high old", Priority::High, day(14), 1))
        .unwrap();
    repo.create_task(&Task::new("high new", Priority::High, day(14), 2))
        .unwrap();
    repo.create_task(&Task::new("other day", Priority::High, day(20), 3))
        .unwrap();

    let tasks = repo.list_tasks_by_date(day(14)).unwrap();
    assert_eq!(titles(&tasks), vec!["high new", "high old", "medium"]);
}

#[test]
fn task_dates_are_distinct_and_start_at_from() {
    let repo = repo();
    for (title, d) in [("a", 10), ("b", 14), ("c", 14), ("d", 20)] {
        repo.create_task(&Task::new(title, Priority::Medium, day(d), 0))
            .unwrap();
    }

    assert_eq!(repo.list_task_dates(day(14)).unwrap(), vec![day(14), day(20)]);
}

#[test]
fn partial_updates_change_only_their_column() {
    let repo = repo();
    let id = repo
        .create_task(&Task::new("Pay rent", Priority::High, day(14), 0).with_reminder(Some(9)))
        .unwrap();

    repo.update_reminder(id, None).unwrap();
    repo.update_status(id, true).unwrap();

    let loaded = repo.get_task(id).unwrap().unwrap();
    assert_eq!(loaded.reminder_at, None);
    assert!(loaded.is_completed);
    assert_eq!(loaded.title, "Pay rent");
}

#[test]
fn full_update_replaces_editable_fields() {
    let repo = repo();
    let id = repo
        .create_task(&Task::new("Pay rent", Priority::High, day(14), 0))
        .unwrap();
    let mut task = repo.get_task(id).unwrap().unwrap();
    task.title = "Pay rent and water".to_string();
    task.priority = Priority::Low;
    task.scheduled_date = day(16);
    task.reminder_at = Some(42);

    repo.update_task(&task).unwrap();

    assert_eq!(repo.get_task(id).unwrap().unwrap(), task);
}

#[test]
fn writes_to_missing_ids_return_not_found() {
    let repo = repo();
    let mut ghost = Task::new("Ghost", Priority::Low, day(14), 0);
    ghost.id = 77;

    assert!(matches!(repo.update_task(&ghost), Err(RepoError::NotFound(77))));
    assert!(matches!(repo.update_status(77, true), Err(RepoError::NotFound(77))));
    assert!(matches!(
        repo.update_reminder(77, Some(1)),
        Err(RepoError::NotFound(77))
    ));
    assert!(matches!(repo.delete_task(77), Err(RepoError::NotFound(77))));
}

#[test]
fn delete_removes_the_row() {
    let repo = repo();
    let id = repo
        .create_task(&Task::new("Pay rent", Priority::High, day(14), 0))
        .unwrap();

    repo.delete_task(id).unwrap();

    assert!(repo.get_task(id).unwrap().is_none());
    assert!(repo.list_tasks().unwrap().is_empty());
}
