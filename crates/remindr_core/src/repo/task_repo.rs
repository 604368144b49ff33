//! Task store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and list-by-filter APIs over the `tasks` table.
//! - Keep SQL inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before touching SQL.
//! - Read paths reject rows that no longer parse instead of masking them.
//! - Updates and deletes of an unknown id return `RepoError::NotFound`.

use crate::db::DbError;
use crate::model::task::{Priority, Task, TaskId, TaskValidationError};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    priority,
    created_at,
    scheduled_date,
    is_completed,
    reminder_at
FROM tasks";

/// `CASE` expression mapping the stored label to `Priority::rank`.
fn priority_rank_sql() -> String {
    let arms: String = Priority::ALL
        .iter()
        .map(|priority| format!(" WHEN '{}' THEN {}", priority.as_str(), priority.rank()))
        .collect();
    format!("CASE priority{arms} END")
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for task and preference persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    /// A thread panicked while holding the connection.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::LockPoisoned => write!(f, "database connection lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Task store consumed by the reminder subsystem and the task service.
pub trait TaskRepository: Send + Sync {
    /// Inserts a task and returns the store-assigned id. `task.id` is ignored.
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// All tasks by scheduled date, priority, completion, then newest first.
    fn list_tasks(&self) -> RepoResult<Vec<Task>>;
    /// Tasks planned for one day by priority, newest first, open before done.
    fn list_tasks_by_date(&self, date: NaiveDate) -> RepoResult<Vec<Task>>;
    /// Distinct scheduled dates on or after `from`, ascending.
    fn list_task_dates(&self, from: NaiveDate) -> RepoResult<Vec<NaiveDate>>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn update_status(&self, id: TaskId, completed: bool) -> RepoResult<()>;
    fn update_reminder(&self, id: TaskId, reminder_at: Option<i64>) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
}

/// SQLite-backed task store.
///
/// Owns its connection behind a mutex so one instance can be shared by
/// background workers through `Arc<dyn TaskRepository>`.
pub struct SqliteTaskRepository {
    conn: Mutex<Connection>,
}

impl SqliteTaskRepository {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::LockPoisoned)
    }

    fn query_tasks(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Task>> {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (
                title,
                description,
                priority,
                created_at,
                scheduled_date,
                is_completed,
                reminder_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task.title.trim(),
                task.description.as_str(),
                task.priority.as_str(),
                task.created_at,
                format_date(task.scheduled_date),
                task.is_completed,
                task.reminder_at,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        let rank = priority_rank_sql();
        let conn = self.conn()?;
        Self::query_tasks(
            &conn,
            &format!(
                "{TASK_SELECT_SQL}
                 ORDER BY
                    scheduled_date ASC,
                    {rank},
                    is_completed ASC,
                    created_at DESC,
                    id ASC;"
            ),
            [],
        )
    }

    fn list_tasks_by_date(&self, date: NaiveDate) -> RepoResult<Vec<Task>> {
        let rank = priority_rank_sql();
        let conn = self.conn()?;
        Self::query_tasks(
            &conn,
            &format!(
                "{TASK_SELECT_SQL}
                 WHERE scheduled_date = ?1
                 ORDER BY
                    {rank},
                    created_at DESC,
                    is_completed ASC,
                    id ASC;"
            ),
            [format_date(date)],
        )
    }

    fn list_task_dates(&self, from: NaiveDate) -> RepoResult<Vec<NaiveDate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT scheduled_date
             FROM tasks
             WHERE scheduled_date >= ?1
             ORDER BY scheduled_date ASC;",
        )?;
        let mut rows = stmt.query([format_date(from)])?;
        let mut dates = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            dates.push(parse_date(&text)?);
        }
        Ok(dates)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn()?.execute(
            "UPDATE tasks
             SET
                title = ?1,
                description = ?2,
                priority = ?3,
                scheduled_date = ?4,
                is_completed = ?5,
                reminder_at = ?6
             WHERE id = ?7;",
            params![
                task.title.trim(),
                task.description.as_str(),
                task.priority.as_str(),
                format_date(task.scheduled_date),
                task.is_completed,
                task.reminder_at,
                task.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }
        Ok(())
    }

    fn update_status(&self, id: TaskId, completed: bool) -> RepoResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE tasks SET is_completed = ?1 WHERE id = ?2;",
            params![completed, id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn update_reminder(&self, id: TaskId, reminder_at: Option<i64>) -> RepoResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE tasks SET reminder_at = ?1 WHERE id = ?2;",
            params![reminder_at, id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority (id={id})"
        ))
    })?;

    let date_text: String = row.get("scheduled_date")?;
    let scheduled_date = parse_date(&date_text)?;

    let is_completed = match row.get::<_, i64>("is_completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_completed value `{other}` in tasks.is_completed (id={id})"
            )));
        }
    };

    let task = Task {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        created_at: row.get("created_at")?,
        scheduled_date,
        is_completed,
        reminder_at: row.get("reminder_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{value}` in tasks.scheduled_date"))
    })
}
