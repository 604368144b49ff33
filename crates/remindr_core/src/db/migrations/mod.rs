//! Ordered schema migrations for the task database.
//!
//! Each step is a plain SQL file; the step number is written to
//! `PRAGMA user_version` inside the same transaction, so an interrupted
//! upgrade leaves the previous schema intact.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// `(version, sql)` pairs, strictly increasing by version.
const STEPS: &[(u32, &str)] = &[
    (1, include_str!("0001_tasks.sql")),
    (2, include_str!("0002_preferences.sql")),
];

/// Latest schema version this binary can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings the schema up to `latest_version()`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let on_disk: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest = latest_version();
    if on_disk > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: on_disk,
            latest_supported: latest,
        });
    }

    let mut pending = STEPS.iter().filter(|(version, _)| *version > on_disk).peekable();
    if pending.peek().is_none() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;
    Ok(())
}
