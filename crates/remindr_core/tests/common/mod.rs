#![allow(dead_code)]

use chrono::NaiveDate;
use remindr_core::{
    open_db_in_memory, AlarmFacility, BootRecovery, ManualClock, NotificationDispatcher,
    NotificationPayload, NotificationSurface, PermissionFlag, PlatformError, PreferenceStore,
    Priority, ReminderConfig, ReminderScheduler, RepoError, RepoResult, SqlitePreferenceStore,
    SqliteTaskRepository, Task, TaskId, TaskRepository, TaskService, TriggerPayload, WakeLock,
    WakeLockProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2026-03-14T12:00:00Z
pub const NOW: i64 = 1_773_489_600_000;
pub const MINUTE: i64 = 60_000;

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

/// Alarm facility that records registrations and can be told to fail.
#[derive(Default)]
pub struct RecordingAlarms {
    armed: Mutex<HashMap<TaskId, TriggerPayload>>,
    register_calls: AtomicU32,
    cancel_calls: AtomicU32,
    failures_left: AtomicU32,
    always_fail: AtomicBool,
}

impl RecordingAlarms {
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self) {
        self.always_fail.store(true, Ordering::SeqCst);
    }

    pub fn register_calls(&self) -> u32 {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn armed(&self, task_id: TaskId) -> Option<TriggerPayload> {
        self.armed.lock().unwrap().get(&task_id).cloned()
    }

    pub fn armed_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.armed.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl AlarmFacility for RecordingAlarms {
    fn register_one_shot(
        &self,
        task_id: TaskId,
        fire_at_ms: i64,
        payload: &TriggerPayload,
    ) -> Result<(), PlatformError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::alarm("exact alarms not permitted"));
        }
        let consumed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if consumed.is_ok() {
            return Err(PlatformError::alarm("alarm service busy"));
        }
        assert_eq!(fire_at_ms, payload.reminder_at);
        self.armed.lock().unwrap().insert(task_id, payload.clone());
        Ok(())
    }

    fn cancel(&self, task_id: TaskId) -> Result<(), PlatformError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.armed.lock().unwrap().remove(&task_id);
        Ok(())
    }
}

/// Notification surface that records what was displayed.
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<(NotificationPayload, bool)>>,
    show_calls: AtomicU32,
    fail_show: AtomicBool,
    fail_fallback: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fallback(&self, fail: bool) {
        self.fail_fallback.store(fail, Ordering::SeqCst);
    }

    /// Calls to the primary display entry point.
    pub fn display_attempts(&self) -> u32 {
        self.show_calls.load(Ordering::SeqCst)
    }

    /// Successfully displayed payloads with their `via_fallback` marker.
    pub fn shown(&self) -> Vec<(NotificationPayload, bool)> {
        self.shown.lock().unwrap().clone()
    }
}

impl NotificationSurface for RecordingNotifier {
    fn show(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        self.show_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(PlatformError::notification("notification manager unavailable"));
        }
        self.shown.lock().unwrap().push((payload.clone(), false));
        Ok(())
    }

    fn show_fallback(&self, payload: &NotificationPayload) -> Result<(), PlatformError> {
        if self.fail_fallback.load(Ordering::SeqCst) {
            return Err(PlatformError::notification("compat display failed"));
        }
        self.shown.lock().unwrap().push((payload.clone(), true));
        Ok(())
    }
}

/// Wake locks that count acquisitions and releases.
#[derive(Default)]
pub struct CountingWakeLocks {
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    fail: AtomicBool,
}

impl CountingWakeLocks {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct CountingLock {
    released: Arc<AtomicUsize>,
    held: bool,
}

impl WakeLock for CountingLock {
    fn is_held(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> Result<(), PlatformError> {
        self.held = false;
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl WakeLockProvider for CountingWakeLocks {
    fn acquire(&self, _tag: &str, timeout: Duration) -> Result<Box<dyn WakeLock>, PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlatformError::wake_lock("power manager unavailable"));
        }
        assert_eq!(timeout, Duration::from_secs(60));
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingLock {
            released: Arc::clone(&self.released),
            held: true,
        }))
    }
}

/// Task store whose every call fails, as if the database file vanished.
pub struct FailingTaskRepository;

fn disk_error<T>() -> RepoResult<T> {
    Err(RepoError::InvalidData("disk I/O error".to_string()))
}

impl TaskRepository for FailingTaskRepository {
    fn create_task(&self, _task: &Task) -> RepoResult<TaskId> {
        disk_error()
    }

    fn get_task(&self, _id: TaskId) -> RepoResult<Option<Task>> {
        disk_error()
    }

    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        disk_error()
    }

    fn list_tasks_by_date(&self, _date: NaiveDate) -> RepoResult<Vec<Task>> {
        disk_error()
    }

    fn list_task_dates(&self, _from: NaiveDate) -> RepoResult<Vec<NaiveDate>> {
        disk_error()
    }

    fn update_task(&self, _task: &Task) -> RepoResult<()> {
        disk_error()
    }

    fn update_status(&self, _id: TaskId, _completed: bool) -> RepoResult<()> {
        disk_error()
    }

    fn update_reminder(&self, _id: TaskId, _reminder_at: Option<i64>) -> RepoResult<()> {
        disk_error()
    }

    fn delete_task(&self, _id: TaskId) -> RepoResult<()> {
        disk_error()
    }
}

/// Flag store that cannot be read or written.
pub struct FailingPreferenceStore;

impl PreferenceStore for FailingPreferenceStore {
    fn get_bool(&self, _key: &str) -> RepoResult<bool> {
        Err(RepoError::LockPoisoned)
    }

    fn set_bool(&self, _key: &str, _value: bool) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }

    fn remove(&self, _key: &str) -> RepoResult<()> {
        Err(RepoError::LockPoisoned)
    }

    fn compare_and_set_bool(&self, _key: &str, _current: bool, _new: bool) -> RepoResult<bool> {
        Err(RepoError::LockPoisoned)
    }
}

/// Reminder subsystem wired to in-memory SQLite and recording fakes.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteTaskRepository>,
    pub flags: Arc<SqlitePreferenceStore>,
    pub alarms: Arc<RecordingAlarms>,
    pub notifier: Arc<RecordingNotifier>,
    pub permission: Arc<PermissionFlag>,
    pub wake_locks: Arc<CountingWakeLocks>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub scheduler: Arc<ReminderScheduler>,
    pub config: ReminderConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ReminderConfig::default())
    }

    pub fn with_config(config: ReminderConfig) -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(SqliteTaskRepository::new(open_db_in_memory().unwrap()));
        let flags = Arc::new(SqlitePreferenceStore::new(open_db_in_memory().unwrap()));
        let alarms = Arc::new(RecordingAlarms::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let permission = Arc::new(PermissionFlag::new(true));
        let wake_locks = Arc::new(CountingWakeLocks::default());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            flags.clone(),
            notifier.clone(),
            permission.clone(),
            wake_locks.clone(),
            clock.clone(),
            config.clone(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            alarms.clone(),
            Arc::clone(&dispatcher),
            clock.clone(),
            config.clone(),
        ));

        Self {
            clock,
            store,
            flags,
            alarms,
            notifier,
            permission,
            wake_locks,
            dispatcher,
            scheduler,
            config,
        }
    }

    pub fn service(&self) -> TaskService {
        TaskService::new(
            self.store.clone(),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.dispatcher),
            self.clock.clone(),
        )
        .unwrap()
    }

    /// Dispatcher sharing this harness's fakes but reading from other stores.
    pub fn dispatcher_over(
        &self,
        store: Arc<dyn TaskRepository>,
        flags: Arc<dyn PreferenceStore>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            store,
            flags,
            self.notifier.clone(),
            self.permission.clone(),
            self.wake_locks.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    pub fn boot_recovery(&self) -> BootRecovery {
        BootRecovery::new(
            self.store.clone(),
            Arc::clone(&self.scheduler),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// Writes a task straight to the store and returns it with its id.
    pub fn insert_task(&self, title: &str, reminder_at: Option<i64>) -> Task {
        let task = Task::new(title, Priority::Medium, day(), NOW).with_reminder(reminder_at);
        let id = self.store.create_task(&task).unwrap();
        self.store.get_task(id).unwrap().unwrap()
    }

    pub fn flag_set(&self, task_id: TaskId) -> bool {
        self.flags
            .get_bool(&format!("notification_shown_{task_id}"))
            .unwrap()
    }
}
