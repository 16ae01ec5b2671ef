//! data_access table queries.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::DataAccessRecord;
use rusqlite::{params, Connection};

pub fn insert_data_access(conn: &Connection, rows: &[DataAccessRecord]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO data_access (function_id, file, table_name, operation, line)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![row.function_id, row.file, row.table_name, row.operation, row.line])?;
    }
    Ok(rows.len())
}

pub fn delete_by_file(conn: &Connection, file: &str) -> Result<usize, StorageError> {
    conn.execute("DELETE FROM data_access WHERE file = ?1", params![file])
        .map_err(StorageError::from)
}

/// Every function that touches `table`, by (function, line).
pub fn get_by_table(conn: &Connection, table: &str) -> Result<Vec<DataAccessRecord>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT function_id, file, table_name, operation, line FROM data_access
         WHERE table_name = ?1 ORDER BY function_id, line",
    )?;
    let rows = stmt.query_map(params![table], |row| {
        Ok(DataAccessRecord {
            function_id: row.get(0)?,
            file: row.get(1)?,
            table_name: row.get(2)?,
            operation: row.get(3)?,
            line: row.get(4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}
