//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task and reminder use-cases to Dart via FRB.
//! - Bridge the reminder subsystem to the OS through a command outbox the
//!   Dart side drains and executes (alarm registration, notification display).
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures come back as messages inside response envelopes.
//! - Every reminder call runs on the process-wide runtime owned by the host.

use chrono::NaiveDate;
use log::{info, warn};
use remindr_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    ping as ping_inner, AlarmFacility, BootRecovery, NewTask, NoopWakeLocks,
    NotificationDispatcher, NotificationPayload, NotificationSurface, PermissionFlag,
    PlatformError, PlatformSeam, Priority, ReminderConfig, ReminderScheduler,
    SqlitePreferenceStore, SqliteTaskRepository, SystemClock, Task, TaskId, TaskService,
    TriggerEvent, TriggerPayload,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::runtime::Runtime;

const DATE_FORMAT: &str = "%Y-%m-%d";
static HOST: OnceLock<ReminderHost> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Idempotent for the same `level + log_dir`; reconfiguration returns error.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// OS work requested by the reminder subsystem, executed by the Dart side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCommand {
    /// Register an exact, idle-capable one-shot alarm. `payload_json` must be
    /// passed back verbatim inside the trigger JSON when it fires.
    RegisterAlarm {
        task_id: i64,
        fire_at_ms: i64,
        payload_json: String,
    },
    CancelAlarm {
        task_id: i64,
    },
    ShowNotification {
        notification_id: i64,
        channel_id: String,
        title: String,
        body: String,
        summary: String,
        open_task_id: i64,
        /// Use the lower-level compat display path.
        compat: bool,
    },
}

/// Task projection returned to Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// `high|medium|low`.
    pub priority: String,
    pub created_at: i64,
    /// `YYYY-MM-DD`.
    pub scheduled_date: String,
    pub is_completed: bool,
    pub reminder_at: Option<i64>,
}

/// Envelope for single-task mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task: Option<TaskItem>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task: &Task) -> Self {
        Self {
            ok: true,
            task: Some(to_task_item(task)),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Result of handling a boot broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootRecoveryResponse {
    /// `false` when the action is not a restart signal.
    pub handled: bool,
    pub pending: u32,
    pub registered: u32,
    pub failed: u32,
    pub message: String,
}

/// Opens the task database and wires the reminder subsystem.
///
/// Input semantics:
/// - `db_path`: SQLite file path; created and migrated when missing.
/// - `config_json`: optional `ReminderConfig` overrides; empty means defaults.
///
/// # FFI contract
/// - Idempotent for the same `db_path`; a different path returns error.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn reminders_init(db_path: String, config_json: String) -> String {
    let db_path = PathBuf::from(db_path.trim());
    if let Some(host) = HOST.get() {
        return host.check_path(&db_path);
    }

    let config = if config_json.trim().is_empty() {
        ReminderConfig::default()
    } else {
        match ReminderConfig::from_json_str(&config_json) {
            Ok(config) => config,
            Err(err) => return format!("reminders_init failed: {err}"),
        }
    };

    match ReminderHost::build(db_path.clone(), config) {
        Ok(host) => {
            // Losing an init race is fine as long as the winner used the same path.
            if HOST.set(host).is_err() {
                return HOST
                    .get()
                    .map_or_else(String::new, |host| host.check_path(&db_path));
            }
            info!("event=reminders_init module=ffi status=ok");
            String::new()
        }
        Err(err) => format!("reminders_init failed: {err}"),
    }
}

/// Pushes the current OS notification grant into the permission gate.
#[flutter_rust_bridge::frb(sync)]
pub fn set_notification_permission(granted: bool) -> String {
    match host() {
        Ok(host) => {
            host.permission.set_granted(granted);
            String::new()
        }
        Err(err) => err,
    }
}

/// Creates a task and registers its reminder.
///
/// # FFI contract
/// - Async on the Dart side. Returns after the first alarm registration
///   attempt; a failed attempt is retried on the host runtime and its
///   `RegisterAlarm` command may reach the outbox later.
/// - `priority` is `high|medium|low`; `scheduled_date` is `YYYY-MM-DD`.
pub fn task_add(
    title: String,
    description: String,
    priority: String,
    scheduled_date: String,
    reminder_at: Option<i64>,
) -> TaskActionResponse {
    let request = match parse_fields(&priority, &scheduled_date) {
        Ok((priority, scheduled_date)) => NewTask {
            title: title.trim().to_string(),
            description,
            priority,
            scheduled_date,
            reminder_at,
        },
        Err(err) => return TaskActionResponse::failure(format!("task_add failed: {err}")),
    };

    let result = host().and_then(|host| {
        host.runtime
            .block_on(host.service.add_task(request))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(task) => TaskActionResponse::success("Task created.", &task),
        Err(err) => TaskActionResponse::failure(format!("task_add failed: {err}")),
    }
}

/// Replaces the editable fields of a task and reschedules its reminder.
pub fn task_update(
    id: i64,
    title: String,
    description: String,
    priority: String,
    scheduled_date: String,
    reminder_at: Option<i64>,
) -> TaskActionResponse {
    let (priority, scheduled_date) = match parse_fields(&priority, &scheduled_date) {
        Ok(fields) => fields,
        Err(err) => return TaskActionResponse::failure(format!("task_update failed: {err}")),
    };

    let result = host().and_then(|host| {
        let current = host
            .service
            .get_task(id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("task not found: {id}"))?;
        let updated = Task {
            title: title.trim().to_string(),
            description,
            priority,
            scheduled_date,
            reminder_at,
            ..current
        };
        host.runtime
            .block_on(host.service.update_task(updated))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(task) => TaskActionResponse::success("Task updated.", &task),
        Err(err) => TaskActionResponse::failure(format!("task_update failed: {err}")),
    }
}

pub fn task_set_completed(id: i64, completed: bool) -> TaskActionResponse {
    let result = host().and_then(|host| {
        host.runtime
            .block_on(host.service.set_completed(id, completed))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(task) => TaskActionResponse::success("Task status updated.", &task),
        Err(err) => TaskActionResponse::failure(format!("task_set_completed failed: {err}")),
    }
}

/// Deletes a task; the response carries the removed snapshot for undo.
pub fn task_delete(id: i64) -> TaskActionResponse {
    let result = host().and_then(|host| {
        host.runtime
            .block_on(host.service.delete_task(id))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(task) => TaskActionResponse::success("Task deleted.", &task),
        Err(err) => TaskActionResponse::failure(format!("task_delete failed: {err}")),
    }
}

/// Lists all tasks, or one day's tasks when `date` (`YYYY-MM-DD`) is given.
#[flutter_rust_bridge::frb(sync)]
pub fn task_list(date: Option<String>) -> TaskListResponse {
    let result = host().and_then(|host| {
        let tasks = match date.as_deref() {
            Some(raw) => host.service.tasks_for_date(parse_date(raw)?),
            None => host.service.list_tasks(),
        };
        tasks.map_err(|err| err.to_string())
    });
    match result {
        Ok(tasks) => TaskListResponse {
            message: format!("{} task(s).", tasks.len()),
            items: tasks.iter().map(to_task_item).collect(),
        },
        Err(err) => TaskListResponse {
            items: Vec::new(),
            message: format!("task_list failed: {err}"),
        },
    }
}

/// Handles a fired alarm.
///
/// `trigger_json` carries `action`, `task_id`, optional `kind`
/// (`primary|backup|preview`) and the snapshot fields from `payload_json`.
/// Returns the dispatch outcome label, or an error message prefixed with
/// `error:`.
pub fn reminder_on_trigger(trigger_json: String) -> String {
    let event: TriggerEvent = match serde_json::from_str(&trigger_json) {
        Ok(event) => event,
        Err(err) => {
            warn!("event=reminder_trigger module=ffi status=error error={err}");
            return format!("error: invalid trigger: {err}");
        }
    };
    match host() {
        Ok(host) => host
            .runtime
            .block_on(host.dispatcher.dispatch(event))
            .label()
            .to_string(),
        Err(err) => format!("error: {err}"),
    }
}

/// Handles a boot broadcast by re-registering pending reminders.
pub fn reminder_on_boot(action: String) -> BootRecoveryResponse {
    let host = match host() {
        Ok(host) => host,
        Err(err) => {
            return BootRecoveryResponse {
                message: err,
                ..BootRecoveryResponse::default()
            }
        }
    };

    match host.runtime.block_on(host.boot.on_signal(action.as_str())) {
        Some(report) => BootRecoveryResponse {
            handled: true,
            pending: to_u32(report.pending),
            registered: to_u32(report.registered),
            failed: to_u32(report.failed),
            message: format!(
                "Re-registered {} of {} reminder(s).",
                report.registered, report.pending
            ),
        },
        None => BootRecoveryResponse {
            message: format!("ignored action `{action}`"),
            ..BootRecoveryResponse::default()
        },
    }
}

/// Shows a preview notification for one task.
pub fn reminder_preview(id: i64) -> String {
    let result = host().and_then(|host| {
        host.runtime
            .block_on(host.service.preview_notification(id))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(outcome) => outcome.label().to_string(),
        Err(err) => format!("error: {err}"),
    }
}

/// Returns and clears every pending OS command, oldest first.
#[flutter_rust_bridge::frb(sync)]
pub fn platform_drain_commands() -> Vec<PlatformCommand> {
    match host() {
        Ok(host) => host.outbox.drain(),
        Err(_) => Vec::new(),
    }
}

struct ReminderHost {
    db_path: PathBuf,
    runtime: Runtime,
    service: TaskService,
    dispatcher: Arc<NotificationDispatcher>,
    boot: BootRecovery,
    permission: Arc<PermissionFlag>,
    outbox: Arc<PlatformOutbox>,
}

impl ReminderHost {
    fn build(db_path: PathBuf, config: ReminderConfig) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("remindr-ffi")
            .enable_time()
            .build()
            .map_err(|err| format!("runtime start failed: {err}"))?;

        let store = Arc::new(SqliteTaskRepository::new(
            open_db(&db_path).map_err(|err| format!("task DB open failed: {err}"))?,
        ));
        let flags = Arc::new(SqlitePreferenceStore::new(
            open_db(&db_path).map_err(|err| format!("flag DB open failed: {err}"))?,
        ));
        let outbox = Arc::new(PlatformOutbox::default());
        let permission = Arc::new(PermissionFlag::default());
        let clock = Arc::new(SystemClock);

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            flags,
            outbox.clone(),
            permission.clone(),
            Arc::new(NoopWakeLocks),
            clock.clone(),
            config.clone(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            outbox.clone(),
            Arc::clone(&dispatcher),
            clock.clone(),
            config.clone(),
        ));
        let service = TaskService::new(
            store.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&dispatcher),
            clock.clone(),
        )
        .map_err(|err| format!("task service init failed: {err}"))?;
        let boot = BootRecovery::new(store, scheduler, clock, config);

        Ok(Self {
            db_path,
            runtime,
            service,
            dispatcher,
            boot,
            permission,
            outbox,
        })
    }

    fn check_path(&self, db_path: &Path) -> String {
        if self.db_path == *db_path {
            return String::new();
        }
        format!(
            "reminders already initialized at `{}`; refusing to switch to `{}`",
            self.db_path.display(),
            db_path.display()
        )
    }
}

fn host() -> Result<&'static ReminderHost, String> {
    HOST.get()
        .ok_or_else(|| "reminders not initialized; call reminders_init first".to_string())
}

/// Queue of OS commands standing in for the alarm and notification facilities.
#[derive(Default)]
struct PlatformOutbox {
    commands: Mutex<VecDeque<PlatformCommand>>,
}

impl PlatformOutbox {
    fn push(&self, command: PlatformCommand, seam: PlatformSeam) -> Result<(), PlatformError> {
        self.commands
            .lock()
            .map_err(|_| PlatformError {
                seam,
                message: "platform outbox lock poisoned".to_string(),
            })?
            .push_back(command);
        Ok(())
    }

    fn drain(&self) -> Vec<PlatformCommand> {
        match self.commands.lock() {
            Ok(mut commands) => commands.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn show_command(payload: &NotificationPayload, compat: bool) -> PlatformCommand {
        PlatformCommand::ShowNotification {
            notification_id: payload.notification_id,
            channel_id: payload.channel_id.clone(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            summary: payload.summary.clone(),
            open_task_id: payload.open_task_id,
            compat,
        }
    }
}

impl AlarmFacility for PlatformOutbox {
    fn register_one_shot(
        &self,
        task_id: TaskId,
        fire_at_ms: i64,
        payload: &TriggerPayload,
    ) -> Result<(), PlatformError> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|err| PlatformError::alarm(format!("payload encode failed: {err}")))?;
        self.push(
            PlatformCommand::RegisterAlarm {
                task_id,
                fire_at_ms,
                payload_json,
            },
            PlatformSeam::Alarm,
        )
    }

    fn cancel(&self, task_id: TaskId) -> Result<(), PlatformError> {
        self.push(PlatformCommand::CancelAlarm { task_id }, PlatformSeam::Alarm)
    }
}

impl NotificationSurface for PlatformOutbox {
    fn show(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        self.push(Self::show_command(payload, false), PlatformSeam::Notification)
    }

    fn show_fallback(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        self.push(Self::show_command(payload, true), PlatformSeam::Notification)
    }
}

fn parse_fields(priority: &str, scheduled_date: &str) -> Result<(Priority, NaiveDate), String> {
    let priority = Priority::parse(priority)
        .ok_or_else(|| format!("invalid priority `{priority}`; expected high|medium|low"))?;
    Ok((priority, parse_date(scheduled_date)?))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| format!("invalid date `{raw}`; expected YYYY-MM-DD"))
}

fn to_task_item(task: &Task) -> TaskItem {
    TaskItem {
        id: task.id,
        title: task.title.clone(),
        description: task.description.clone(),
        priority: task.priority.as_str().to_string(),
        created_at: task.created_at,
        scheduled_date: task.scheduled_date.format(DATE_FORMAT).to_string(),
        is_completed: task.is_completed,
        reminder_at: task.reminder_at,
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
