//! Connection management: one write connection for migrations and
//! maintenance, a dedicated connection for the batch writer, and a pool of
//! read-only connections.

pub mod pool;
pub mod pragmas;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use calltrace_core::errors::StorageError;
use rusqlite::Connection;

use self::pool::ReadPool;
use self::pragmas::apply_pragmas;
use crate::migrations;

pub struct DatabaseManager {
    writer: Mutex<Connection>,
    readers: ReadPool,
    path: PathBuf,
}

impl DatabaseManager {
    /// Open a database at the given path, apply pragmas, run migrations.
    pub fn open(path: &Path, read_pool_size: usize) -> Result<Self, StorageError> {
        let writer = Connection::open(path).map_err(|e| StorageError::SqliteError {
            message: format!("open {}: {e}", path.display()),
        })?;
        apply_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;

        let readers = ReadPool::open(path, read_pool_size)?;
        tracing::debug!(path = %path.display(), readers = readers.size(), "database opened");

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            path: path.to_path_buf(),
        })
    }

    /// Execute an operation on the maintenance write connection.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let guard = self
            .writer
            .lock()
            .map_err(|_| StorageError::LockPoisoned("write connection".to_string()))?;
        f(&guard)
    }

    /// Execute a read operation with a pooled read connection.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        self.readers.with_conn(f)
    }

    /// Fold the WAL back into the main file, release pages freed by removed
    /// files, and refresh planner statistics. Returns the number of WAL
    /// frames checkpointed.
    pub fn checkpoint(&self) -> Result<i64, StorageError> {
        self.with_writer(|conn| {
            let (busy, frames): (i64, i64) =
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                    Ok((row.get(0)?, row.get(2)?))
                })?;
            if busy != 0 {
                tracing::warn!(path = %self.path.display(), "checkpoint blocked by an open reader");
            }
            conn.execute_batch("PRAGMA incremental_vacuum; PRAGMA optimize;")?;
            tracing::debug!(frames, "checkpoint complete");
            Ok(frames)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection to the same database for the batch writer.
    pub fn open_batch_connection(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path).map_err(|e| StorageError::SqliteError {
            message: format!("open batch connection: {e}"),
        })?;
        apply_pragmas(&conn)?;
        Ok(conn)
    }
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("path", &self.path)
            .field("readers", &self.readers.size())
            .finish()
    }
}
