//! functions table queries.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::{EntryPointRecord, FunctionRecord};
use rusqlite::{params, Connection, Row};

use super::{hash_from_sql, hash_to_sql};

pub(crate) const FUNCTION_COLUMNS: &str = "id, file, name, qualified_name, language, line, end_line,
    is_exported, signature_hash, body_hash, return_type,
    entry_kind, entry_route, entry_method, entry_framework, entry_confidence";

/// Map a row selected with `FUNCTION_COLUMNS`.
pub(crate) fn function_from_row(row: &Row<'_>) -> rusqlite::Result<FunctionRecord> {
    let entry_kind: Option<String> = row.get(11)?;
    let entry_point = match entry_kind {
        Some(kind) => Some(EntryPointRecord {
            kind,
            route: row.get(12)?,
            method: row.get(13)?,
            framework: row.get(14)?,
            confidence: row.get::<_, Option<f64>>(15)?.unwrap_or(0.0) as f32,
        }),
        None => None,
    };
    Ok(FunctionRecord {
        id: row.get(0)?,
        file: row.get(1)?,
        name: row.get(2)?,
        qualified_name: row.get(3)?,
        language: row.get(4)?,
        line: row.get(5)?,
        end_line: row.get(6)?,
        is_exported: row.get(7)?,
        signature_hash: hash_from_sql(row.get(8)?),
        body_hash: hash_from_sql(row.get(9)?),
        return_type: row.get(10)?,
        entry_point,
    })
}

/// Insert or update functions in place. Updating keeps the row, so edges
/// pointing at the function survive.
pub fn upsert_functions(conn: &Connection, functions: &[FunctionRecord]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO functions
         (id, file, name, qualified_name, language, line, end_line, is_exported,
          signature_hash, body_hash, return_type,
          entry_kind, entry_route, entry_method, entry_framework, entry_confidence)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(id) DO UPDATE SET
            file = excluded.file,
            name = excluded.name,
            qualified_name = excluded.qualified_name,
            language = excluded.language,
            line = excluded.line,
            end_line = excluded.end_line,
            is_exported = excluded.is_exported,
            signature_hash = excluded.signature_hash,
            body_hash = excluded.body_hash,
            return_type = excluded.return_type,
            entry_kind = excluded.entry_kind,
            entry_route = excluded.entry_route,
            entry_method = excluded.entry_method,
            entry_framework = excluded.entry_framework,
            entry_confidence = excluded.entry_confidence",
    )?;

    for f in functions {
        let ep = f.entry_point.as_ref();
        stmt.execute(params![
            f.id,
            f.file,
            f.name,
            f.qualified_name,
            f.language,
            f.line,
            f.end_line,
            f.is_exported,
            hash_to_sql(f.signature_hash),
            hash_to_sql(f.body_hash),
            f.return_type,
            ep.map(|e| e.kind.as_str()),
            ep.and_then(|e| e.route.as_deref()),
            ep.and_then(|e| e.method.as_deref()),
            ep.and_then(|e| e.framework.as_deref()),
            ep.map(|e| e.confidence as f64),
        ])?;
    }
    Ok(functions.len())
}

/// Delete functions by id. Their edges go with them.
pub fn delete_functions(conn: &Connection, ids: &[String]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached("DELETE FROM functions WHERE id = ?1")?;
    let mut count = 0;
    for id in ids {
        count += stmt.execute(params![id])?;
    }
    Ok(count)
}

pub fn get_function(conn: &Connection, id: &str) -> Result<Option<FunctionRecord>, StorageError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {FUNCTION_COLUMNS} FROM functions WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![id], function_from_row)?;
    rows.next().transpose().map_err(StorageError::from)
}

/// Functions of one file, ordered by line.
pub fn get_functions_by_file(conn: &Connection, file: &str) -> Result<Vec<FunctionRecord>, StorageError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {FUNCTION_COLUMNS} FROM functions WHERE file = ?1 ORDER BY line, id"
    ))?;
    let rows = stmt.query_map(params![file], function_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}

pub fn count_functions(conn: &Connection) -> Result<usize, StorageError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM functions", [], |row| row.get(0))?;
    Ok(n as usize)
}

pub fn delete_all(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "DELETE FROM call_edges;
         DELETE FROM data_access;
         DELETE FROM extractions;
         DELETE FROM functions;",
    )
    .map_err(StorageError::from)
}
