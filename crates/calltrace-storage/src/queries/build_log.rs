//! build_log table queries.

use calltrace_core::errors::StorageError;
use rusqlite::{params, Connection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLogEntry {
    pub applied_at: i64,
    pub full_rebuild: bool,
    pub rows_written: usize,
    pub function_count: usize,
    pub edge_count: usize,
}

/// Record one applied changeset with the table sizes after it.
pub fn record(conn: &Connection, full_rebuild: bool, rows_written: usize) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO build_log (full_rebuild, rows_written, function_count, edge_count)
         VALUES (?1, ?2, (SELECT COUNT(*) FROM functions), (SELECT COUNT(*) FROM call_edges))",
        params![full_rebuild, rows_written as i64],
    )?;
    Ok(())
}

/// Most recent entries first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<BuildLogEntry>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT applied_at, full_rebuild, rows_written, function_count, edge_count
         FROM build_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(BuildLogEntry {
            applied_at: row.get(0)?,
            full_rebuild: row.get(1)?,
            rows_written: row.get::<_, i64>(2)? as usize,
            function_count: row.get::<_, i64>(3)? as usize,
            edge_count: row.get::<_, i64>(4)? as usize,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}
