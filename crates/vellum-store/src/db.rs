//! Database connection management
//!
//! Opening and configuring SQLite connections, plus [`atomic`], the single
//! way every multi-statement write in the engine is made all-or-nothing.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// SQLite journal mode applied by [`configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Memory,
    #[default]
    Wal,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbOptions {
    /// How long a writer waits for another connection's lock.
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            journal_mode: JournalMode::Wal,
        }
    }
}

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Enable foreign keys and apply the journal mode and busy timeout.
pub fn configure(conn: &Connection, options: &DbOptions) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON; PRAGMA journal_mode = {};",
        options.journal_mode.as_pragma()
    ))
    .map_err(from_rusqlite)?;
    conn.busy_timeout(options.busy_timeout)
        .map_err(from_rusqlite)?;
    Ok(())
}

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

enum Scope {
    Transaction,
    Savepoint(String),
}

/// Rolls back on drop unless finished, so a panic inside an atomic block
/// never leaves a half-applied write behind.
struct AtomicGuard<'c> {
    conn: &'c Connection,
    scope: Scope,
    done: bool,
}

impl<'c> AtomicGuard<'c> {
    fn begin(conn: &'c Connection) -> Result<Self> {
        let scope = if conn.is_autocommit() {
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(from_rusqlite)?;
            Scope::Transaction
        } else {
            let name = format!("vellum_sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed));
            conn.execute_batch(&format!("SAVEPOINT {}", name))
                .map_err(from_rusqlite)?;
            Scope::Savepoint(name)
        };
        Ok(Self {
            conn,
            scope,
            done: false,
        })
    }

    fn commit(mut self) -> Result<()> {
        let sql = match &self.scope {
            Scope::Transaction => "COMMIT".to_string(),
            Scope::Savepoint(name) => format!("RELEASE {}", name),
        };
        self.conn.execute_batch(&sql).map_err(from_rusqlite)?;
        self.done = true;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let sql = match &self.scope {
            Scope::Transaction => "ROLLBACK".to_string(),
            Scope::Savepoint(name) => format!("ROLLBACK TO {name}; RELEASE {name}"),
        };
        if let Err(err) = self.conn.execute_batch(&sql) {
            tracing::warn!(error = %err, "rollback failed");
        }
    }
}

impl Drop for AtomicGuard<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

/// Run `f` so that all of its writes commit together or not at all.
///
/// At the outermost level this opens a `BEGIN IMMEDIATE` transaction, which
/// takes the write lock up front so two writers serialise instead of
/// deadlocking on upgrade. Nested calls use savepoints, so an inner failure
/// only unwinds the inner block and the caller decides what to do with it.
///
/// # Errors
///
/// Returns the error from `f` after rolling back, or a persistence error if
/// the transaction cannot be opened or committed.
pub fn atomic<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let mut guard = AtomicGuard::begin(conn)?;
    match f(conn) {
        Ok(value) => {
            guard.commit()?;
            Ok(value)
        }
        Err(err) => {
            guard.rollback();
            Err(err)
        }
    }
}

/// Timestamps are stored as Unix milliseconds.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}
