//! extractions table queries.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::ExtractionRecord;
use rusqlite::{params, Connection, Row};

fn extraction_from_row(row: &Row<'_>) -> rusqlite::Result<ExtractionRecord> {
    Ok(ExtractionRecord {
        file: row.get(0)?,
        language: row.get(1)?,
        payload: row.get(2)?,
    })
}

pub fn upsert_extractions(conn: &Connection, records: &[ExtractionRecord]) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO extractions (file, language, payload) VALUES (?1, ?2, ?3)",
    )?;
    for r in records {
        stmt.execute(params![r.file, r.language, r.payload])?;
    }
    Ok(records.len())
}

pub fn delete_by_file(conn: &Connection, file: &str) -> Result<usize, StorageError> {
    conn.execute("DELETE FROM extractions WHERE file = ?1", params![file])
        .map_err(StorageError::from)
}

/// Every stored extraction, by file.
pub fn load_all(conn: &Connection) -> Result<Vec<ExtractionRecord>, StorageError> {
    let mut stmt = conn.prepare_cached("SELECT file, language, payload FROM extractions ORDER BY file")?;
    let rows = stmt.query_map([], extraction_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}

/// Extractions for the given files; files with nothing stored are skipped.
pub fn load_files(conn: &Connection, files: &[String]) -> Result<Vec<ExtractionRecord>, StorageError> {
    let mut stmt = conn.prepare_cached("SELECT file, language, payload FROM extractions WHERE file = ?1")?;
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let mut rows = stmt.query_map(params![file], extraction_from_row)?;
        if let Some(row) = rows.next() {
            out.push(row?);
        }
    }
    Ok(out)
}
