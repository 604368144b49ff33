//! Task use-case service.
//!
//! # Responsibility
//! - Provide create/update/complete/delete/list entry points for hosts.
//! - Keep reminder triggers in step with every task mutation.
//! - Publish ordered task snapshots to subscribers.
//!
//! # Invariants
//! - Every mutation that can change a reminder goes through
//!   `ReminderScheduler::reschedule_detached`, which also clears the de-dup
//!   flag. The first registration attempt finishes before the mutation
//!   returns; retries after a failed attempt continue in the background and
//!   give up once the task is cancelled again.
//! - Completing a task cancels its trigger; deleting cancels before the row
//!   is removed.
//! - Reminder maintenance never turns a successful store write into an error.

use crate::model::task::{Priority, Task, TaskId, TaskValidationError};
use crate::platform::alarm::{DeliveryKind, TriggerEvent};
use crate::platform::clock::Clock;
use crate::reminder::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::reminder::scheduler::ReminderScheduler;
use crate::repo::task_repo::{RepoError, RepoResult, TaskRepository};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    Validation(TaskValidationError),
    TaskNotFound(TaskId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Background worker failed before returning a result.
    Background(String),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Background(message) => write!(f, "background worker failed: {message}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Request model for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub scheduled_date: NaiveDate,
    /// Reminder instant in epoch milliseconds.
    pub reminder_at: Option<i64>,
}

/// Tasks sharing one scheduled date, in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDateGroup {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

/// Task service facade over the store and the reminder subsystem.
pub struct TaskService {
    store: Arc<dyn TaskRepository>,
    scheduler: Arc<ReminderScheduler>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    snapshots: watch::Sender<Vec<Task>>,
}

impl TaskService {
    /// Creates the service and loads the initial snapshot.
    pub fn new(
        store: Arc<dyn TaskRepository>,
        scheduler: Arc<ReminderScheduler>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TaskServiceError> {
        let initial = store.list_tasks()?;
        let (snapshots, _) = watch::channel(initial);
        Ok(Self {
            store,
            scheduler,
            dispatcher,
            clock,
            snapshots,
        })
    }

    /// Creates one task and registers its reminder.
    ///
    /// # Contract
    /// - `created_at` is taken from the service clock.
    /// - Returns the stored task with its new id.
    pub async fn add_task(&self, request: NewTask) -> Result<Task, TaskServiceError> {
        let task = Task::new(
            request.title,
            request.priority,
            request.scheduled_date,
            self.clock.now_ms(),
        )
        .with_description(request.description)
        .with_reminder(request.reminder_at);
        task.validate()?;

        let task = self.insert(task).await?;
        info!(
            "event=task_add module=service status=ok task_id={} has_reminder={}",
            task.id,
            task.reminder_at.is_some()
        );
        Ok(task)
    }

    /// Replaces every editable field of an existing task.
    pub async fn update_task(&self, task: Task) -> Result<Task, TaskServiceError> {
        task.validate()?;
        let id = task.id;
        self.on_store(move |store| store.update_task(&task)).await?;

        let updated = self.read_back(id, "updated task not found in read-back").await?;
        self.scheduler.reschedule_detached(&updated);
        self.publish().await;
        Ok(updated)
    }

    /// Marks a task done (cancelling its reminder) or reopens it.
    pub async fn set_completed(
        &self,
        id: TaskId,
        completed: bool,
    ) -> Result<Task, TaskServiceError> {
        self.on_store(move |store| store.update_status(id, completed))
            .await?;

        let task = self.read_back(id, "task missing after status change").await?;
        if completed {
            self.scheduler.cancel(id);
        } else {
            self.scheduler.reschedule_detached(&task);
        }
        info!("event=task_status module=service status=ok task_id={id} completed={completed}");
        self.publish().await;
        Ok(task)
    }

    /// Sets or clears the reminder instant.
    pub async fn set_reminder(
        &self,
        id: TaskId,
        reminder_at: Option<i64>,
    ) -> Result<Task, TaskServiceError> {
        self.on_store(move |store| store.update_reminder(id, reminder_at))
            .await?;

        let task = self.read_back(id, "task missing after reminder change").await?;
        self.scheduler.reschedule_detached(&task);
        self.publish().await;
        Ok(task)
    }

    /// Deletes a task and returns the removed snapshot for undo.
    pub async fn delete_task(&self, id: TaskId) -> Result<Task, TaskServiceError> {
        let task = self
            .on_store(move |store| store.get_task(id))
            .await?
            .ok_or(TaskServiceError::TaskNotFound(id))?;

        self.scheduler.cancel(id);
        self.on_store(move |store| store.delete_task(id)).await?;
        info!("event=task_delete module=service status=ok task_id={id}");
        self.publish().await;
        Ok(task)
    }

    /// Re-inserts a deleted task snapshot.
    ///
    /// # Contract
    /// - The restored task gets a new id; `created_at` is preserved.
    /// - Its reminder is registered again if still active.
    pub async fn restore_task(&self, snapshot: Task) -> Result<Task, TaskServiceError> {
        snapshot.validate()?;
        let previous_id = snapshot.id;
        let task = self.insert(Task { id: 0, ..snapshot }).await?;
        info!(
            "event=task_restore module=service status=ok previous_id={previous_id} task_id={}",
            task.id
        );
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.store.get_task(id)
    }

    pub fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        self.store.list_tasks()
    }

    pub fn tasks_for_date(&self, date: NaiveDate) -> RepoResult<Vec<Task>> {
        self.store.list_tasks_by_date(date)
    }

    /// Full task list split into consecutive per-date groups, oldest date first.
    pub fn tasks_grouped_by_date(&self) -> RepoResult<Vec<TaskDateGroup>> {
        Ok(group_by_date(self.store.list_tasks()?))
    }

    /// Dates with at least one task, on or after `from`.
    pub fn task_dates(&self, from: NaiveDate) -> RepoResult<Vec<NaiveDate>> {
        self.store.list_task_dates(from)
    }

    /// Receives the ordered task list after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.snapshots.subscribe()
    }

    /// Shows a preview notification for one task without touching de-dup state.
    pub async fn preview_notification(
        &self,
        id: TaskId,
    ) -> Result<DispatchOutcome, TaskServiceError> {
        let task = self
            .on_store(move |store| store.get_task(id))
            .await?
            .ok_or(TaskServiceError::TaskNotFound(id))?;
        Ok(self
            .dispatcher
            .dispatch(TriggerEvent::for_task(&task, DeliveryKind::Preview))
            .await)
    }

    pub fn notifications_permitted(&self) -> bool {
        self.dispatcher.notifications_permitted()
    }

    async fn insert(&self, task: Task) -> Result<Task, TaskServiceError> {
        let id = self.on_store(move |store| store.create_task(&task)).await?;
        let created = self.read_back(id, "created task not found in read-back").await?;
        self.scheduler.reschedule_detached(&created);
        self.publish().await;
        Ok(created)
    }

    async fn read_back(&self, id: TaskId, missing: &'static str) -> Result<Task, TaskServiceError> {
        self.on_store(move |store| store.get_task(id))
            .await?
            .ok_or(TaskServiceError::InconsistentState(missing))
    }

    async fn publish(&self) {
        match self.on_store(|store| store.list_tasks()).await {
            Ok(tasks) => {
                self.snapshots.send_replace(tasks);
            }
            Err(err) => warn!("event=task_snapshot module=service status=error error={err}"),
        }
    }

    /// Runs a store call on the blocking pool.
    async fn on_store<T, F>(&self, op: F) -> Result<T, TaskServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TaskRepository) -> RepoResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| TaskServiceError::Background(err.to_string()))?
            .map_err(TaskServiceError::from)
    }
}

fn group_by_date(tasks: Vec<Task>) -> Vec<TaskDateGroup> {
    let mut groups: Vec<TaskDateGroup> = Vec::new();
    for task in tasks {
        match groups.last_mut() {
            Some(group) if group.date == task.scheduled_date => group.tasks.push(task),
            _ => groups.push(TaskDateGroup {
                date: task.scheduled_date,
                tasks: vec![task],
            }),
        }
    }
    groups
}
