//! Write connection utilities: BEGIN IMMEDIATE transactions.

use calltrace_core::errors::StorageError;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Execute a write operation inside a BEGIN IMMEDIATE transaction.
/// The write lock is taken at transaction start, so a concurrent writer
/// waits on busy_timeout instead of failing mid-transaction. Any error rolls
/// the whole transaction back.
pub fn with_immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
{
    // Dropping the transaction uncommitted rolls back.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| match StorageError::from(e) {
            busy @ StorageError::Busy { .. } => busy,
            other => StorageError::SqliteError {
                message: format!("failed to begin immediate transaction: {other}"),
            },
        })?;

    let result = f(&tx)?;

    tx.commit().map_err(|e| StorageError::SqliteError {
        message: format!("failed to commit: {e}"),
    })?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL) STRICT;")
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn commits_on_success() {
        let conn = conn();
        with_immediate_transaction(&conn, |tx| {
            tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn rolls_back_on_error() {
        let conn = conn();
        let result: Result<(), StorageError> = with_immediate_transaction(&conn, |tx| {
            tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(StorageError::Unavailable {
                message: "abort".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit(), "no transaction left open");
    }
}
