//! Connection pragmas. Write connections get the full set; read connections
//! only the cache and timeout settings plus `query_only`.

use std::time::Duration;

use calltrace_core::errors::StorageError;
use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `auto_vacuum` value for INCREMENTAL.
const AUTO_VACUUM_INCREMENTAL: i64 = 2;

/// Page cache (negative = KiB), mmap window and temp storage.
const CACHE_PRAGMAS: &[(&str, &str)] = &[
    ("cache_size", "-64000"),
    ("mmap_size", "268435456"),
    ("temp_store", "MEMORY"),
];

const WRITE_PRAGMAS: &[(&str, &str)] = &[("synchronous", "NORMAL"), ("foreign_keys", "ON")];

fn pragma_error(name: &str, e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: format!("PRAGMA {name}: {e}"),
    }
}

fn set_all(conn: &Connection, pragmas: &[(&str, &str)]) -> Result<(), StorageError> {
    for &(name, value) in pragmas {
        conn.pragma_update(None, name, value)
            .map_err(|e| pragma_error(name, e))?;
    }
    Ok(())
}

/// Configure a connection that will write: WAL journal, cascading foreign
/// keys, incremental vacuum.
pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(|e| pragma_error("journal_mode", e))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(%mode, "WAL journal unavailable; readers will block during writes");
    }
    set_all(conn, WRITE_PRAGMAS)?;
    set_all(conn, CACHE_PRAGMAS)?;

    // Switching auto_vacuum on an existing file needs a VACUUM to take
    // effect; after that the mode sticks.
    let auto_vacuum: i64 = conn
        .pragma_query_value(None, "auto_vacuum", |row| row.get(0))
        .map_err(|e| pragma_error("auto_vacuum", e))?;
    if auto_vacuum != AUTO_VACUUM_INCREMENTAL {
        conn.execute_batch("PRAGMA auto_vacuum = INCREMENTAL; VACUUM;")
            .map_err(|e| pragma_error("auto_vacuum", e))?;
    }
    Ok(())
}

/// Configure a read-only pool connection.
pub fn apply_read_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    set_all(conn, &[("query_only", "ON")])?;
    set_all(conn, CACHE_PRAGMAS)
}

/// True when the database is in WAL mode.
pub fn verify_wal_mode(conn: &Connection) -> Result<bool, StorageError> {
    let mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_gets_wal_and_foreign_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("p.db")).unwrap();
        apply_pragmas(&conn).unwrap();
        assert!(verify_wal_mode(&conn).unwrap());
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
        let av: i64 = conn
            .pragma_query_value(None, "auto_vacuum", |row| row.get(0))
            .unwrap();
        assert_eq!(av, AUTO_VACUUM_INCREMENTAL);
    }

    #[test]
    fn read_connection_refuses_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        apply_read_pragmas(&conn).unwrap();
        assert!(conn.execute("INSERT INTO t (v) VALUES (1)", []).is_err());
    }
}
