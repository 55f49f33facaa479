//! SQLite-backed collection store.
//!
//! `Store` knows nothing about leads or processes. It creates named collections
//! (tables), and reads and writes flat [`Record`]s through a small filter/order
//! vocabulary. Values always travel as bound parameters; only collection and
//! column names are spliced into statement text, and those are checked with
//! [`crate::util::is_identifier`] first.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub mod entity;
pub mod records;
pub mod types;

pub use entity::Entity;
pub use types::*;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so a read-then-write
    /// sequence inside `f` cannot interleave with another writer on the same file.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(DbError::from(e).into());
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) a database file. Missing parent directories are created.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(busy_timeout)?;

        log::debug!("Opened store at {}", path.display());
        Ok(Self { conn })
    }

    /// Private in-memory database. Gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================
