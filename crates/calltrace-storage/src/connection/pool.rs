//! Read-only connections for query traffic, separate from the writer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use calltrace_core::errors::StorageError;
use rusqlite::{Connection, OpenFlags};

use super::pragmas::apply_read_pragmas;

const MAX_READERS: usize = 8;

pub struct ReadPool {
    readers: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
}

impl ReadPool {
    /// Open `pool_size` readers, clamped to `1..=8`.
    pub fn open(path: &Path, pool_size: usize) -> Result<Self, StorageError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let readers = (0..pool_size.clamp(1, MAX_READERS))
            .map(|_| {
                let conn = Connection::open_with_flags(path, flags)?;
                apply_read_pragmas(&conn)?;
                Ok(Mutex::new(conn))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Self {
            readers,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Run `f` on an idle reader, or wait on the next one in rotation when
    /// all are busy.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let guard = self.idle_reader(start)?.map_or_else(
            || {
                self.readers[start % self.readers.len()]
                    .lock()
                    .map_err(|_| poisoned())
            },
            Ok,
        )?;
        f(&guard)
    }

    fn idle_reader(&self, start: usize) -> Result<Option<MutexGuard<'_, Connection>>, StorageError> {
        let n = self.readers.len();
        for offset in 0..n {
            match self.readers[(start + offset) % n].try_lock() {
                Ok(guard) => return Ok(Some(guard)),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(poisoned()),
            }
        }
        Ok(None)
    }

    pub fn size(&self) -> usize {
        self.readers.len()
    }
}

fn poisoned() -> StorageError {
    StorageError::LockPoisoned("read pool".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_clamped_and_nested_reads_do_not_deadlock() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("r.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        assert_eq!(ReadPool::open(&path, 0).unwrap().size(), 1);
        assert_eq!(ReadPool::open(&path, 64).unwrap().size(), MAX_READERS);

        let pool = ReadPool::open(&path, 2).unwrap();
        let v: i64 = pool
            .with_conn(|outer| {
                let inner: i64 = pool.with_conn(|c| {
                    Ok(c.query_row("SELECT v FROM t", [], |r| r.get(0))?)
                })?;
                let outer_v: i64 = outer.query_row("SELECT v FROM t", [], |r| r.get(0))?;
                Ok(inner + outer_v)
            })
            .unwrap();
        assert_eq!(v, 14);
    }
}
