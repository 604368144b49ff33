//! Boolean key-value preferences.
//!
//! # Responsibility
//! - Persist small boolean flags (reminder de-dup markers).
//! - Offer a compare-and-set primitive so concurrent writers cannot both win.
//!
//! # Invariants
//! - A missing key reads as `false`.
//! - `compare_and_set_bool` swaps only when the stored value equals `current`.

use crate::repo::task_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Persistent boolean flag store.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str) -> RepoResult<bool>;
    fn set_bool(&self, key: &str, value: bool) -> RepoResult<()>;
    fn remove(&self, key: &str) -> RepoResult<()>;
    /// Atomically replaces `current` with `new`; returns whether it swapped.
    fn compare_and_set_bool(&self, key: &str, current: bool, new: bool) -> RepoResult<bool>;
}

/// SQLite-backed preferences stored in the `preferences` table.
pub struct SqlitePreferenceStore {
    conn: Mutex<Connection>,
}

impl SqlitePreferenceStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get_bool(&self, key: &str) -> RepoResult<bool> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(value == Some(1))
    }

    fn set_bool(&self, key: &str, value: bool) -> RepoResult<()> {
        self.conn()?.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.conn()?
            .execute("DELETE FROM preferences WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn compare_and_set_bool(&self, key: &str, current: bool, new: bool) -> RepoResult<bool> {
        if current == new {
            return Ok(self.get_bool(key)? == current);
        }

        let conn = self.conn()?;
        // Absent reads as false, so a false->true swap must also insert.
        let changed = if current {
            conn.execute(
                "UPDATE preferences
                 SET value = 0, updated_at = (strftime('%s', 'now') * 1000)
                 WHERE key = ?1 AND value = 1;",
                [key],
            )?
        } else {
            conn.execute(
                "INSERT INTO preferences (key, value) VALUES (?1, 1)
                 ON CONFLICT(key) DO UPDATE SET
                    value = 1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE preferences.value = 0;",
                [key],
            )?
        };
        Ok(changed == 1)
    }
}

/// Process-local preferences for hosts without persistence and for tests.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    values: Mutex<HashMap<String, bool>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> RepoResult<MutexGuard<'_, HashMap<String, bool>>> {
        self.values.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get_bool(&self, key: &str) -> RepoResult<bool> {
        Ok(self.values()?.get(key).copied().unwrap_or(false))
    }

    fn set_bool(&self, key: &str, value: bool) -> RepoResult<()> {
        self.values()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<()> {
        self.values()?.remove(key);
        Ok(())
    }

    fn compare_and_set_bool(&self, key: &str, current: bool, new: bool) -> RepoResult<bool> {
        let mut values = self.values()?;
        let stored = values.get(key).copied().unwrap_or(false);
        if stored != current {
            return Ok(false);
        }
        values.insert(key.to_string(), new);
        Ok(true)
    }
}
