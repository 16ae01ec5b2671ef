//! call_edges table queries.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::CallEdgeRecord;
use rusqlite::{params, Connection, Row};

const EDGE_COLUMNS: &str = "caller_id, callee_id, call_site_line, resolution, confidence";

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<CallEdgeRecord> {
    Ok(CallEdgeRecord {
        caller_id: row.get(0)?,
        callee_id: row.get(1)?,
        call_site_line: row.get(2)?,
        resolution: row.get(3)?,
        confidence: row.get::<_, f64>(4)? as f32,
    })
}

/// Insert a batch of call edges. An edge with the same identity replaces
/// the stored one.
pub fn insert_call_edges(conn: &Connection, edges: &[CallEdgeRecord]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO call_edges
         (caller_id, callee_id, call_site_line, resolution, confidence)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for edge in edges {
        stmt.execute(params![
            edge.caller_id,
            edge.callee_id,
            edge.call_site_line,
            edge.resolution,
            edge.confidence as f64,
        ])?;
    }
    Ok(edges.len())
}

/// Drop every outgoing edge of the given callers.
pub fn delete_outgoing(conn: &Connection, callers: &[String]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached("DELETE FROM call_edges WHERE caller_id = ?1")?;
    let mut count = 0;
    for caller in callers {
        count += stmt.execute(params![caller])?;
    }
    Ok(count)
}

/// Edges where the given function is the caller, by (callee, line).
pub fn get_edges_by_caller(conn: &Connection, caller_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {EDGE_COLUMNS} FROM call_edges WHERE caller_id = ?1
         ORDER BY callee_id, call_site_line"
    ))?;
    let rows = stmt.query_map(params![caller_id], edge_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}

/// Edges where the given function is the callee, by (caller, line).
pub fn get_edges_by_callee(conn: &Connection, callee_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {EDGE_COLUMNS} FROM call_edges WHERE callee_id = ?1
         ORDER BY caller_id, call_site_line"
    ))?;
    let rows = stmt.query_map(params![callee_id], edge_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}

pub fn count_call_edges(conn: &Connection) -> Result<usize, StorageError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM call_edges", [], |row| row.get(0))?;
    Ok(n as usize)
}

/// Edge counts per resolution strategy name.
pub fn count_by_resolution(conn: &Connection) -> Result<Vec<(String, usize)>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT resolution, COUNT(*) FROM call_edges GROUP BY resolution ORDER BY resolution",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}
