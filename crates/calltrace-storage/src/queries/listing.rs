//! Keyset-paginated listings: entry points and function search.
//!
//! Cursors are `(sort_value, id)` pairs. Entry points sort by id alone (sort
//! value is empty); search sorts by match rank then id.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::FunctionRecord;
use calltrace_core::types::pagination::{PaginatedResult, PaginationCursor};
use rusqlite::{params, Connection};

use super::functions::{function_from_row, FUNCTION_COLUMNS};

fn page<T>(mut rows: Vec<(String, String, T)>, total: i64, limit: usize) -> PaginatedResult<T> {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next_cursor = if has_more {
        rows.last()
            .map(|(sort, id, _)| PaginationCursor::new(sort.clone(), id.clone()).encode())
    } else {
        None
    };
    PaginatedResult {
        items: rows.into_iter().map(|(_, _, item)| item).collect(),
        total: total.max(0) as u64,
        has_more,
        next_cursor,
    }
}

/// Entry points ordered by function id.
pub fn entry_points(
    conn: &Connection,
    cursor: Option<&PaginationCursor>,
    limit: usize,
) -> Result<PaginatedResult<FunctionRecord>, StorageError> {
    let limit = limit.max(1);
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM functions WHERE entry_kind IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    let after = cursor.map(|c| c.last_id.as_str()).unwrap_or("");
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {FUNCTION_COLUMNS} FROM functions
         WHERE entry_kind IS NOT NULL AND id > ?1
         ORDER BY id LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![after, (limit + 1) as i64], function_from_row)?;
    let mut keyed = Vec::new();
    for row in rows {
        let record = row?;
        keyed.push((String::new(), record.id.clone(), record));
    }
    Ok(page(keyed, total, limit))
}

/// Case-insensitive substring search over name, qualified name and file.
/// Rank 0 is an exact name match, 1 a name prefix, 2 anything else.
pub fn search_functions(
    conn: &Connection,
    query: &str,
    cursor: Option<&PaginationCursor>,
    limit: usize,
) -> Result<PaginatedResult<FunctionRecord>, StorageError> {
    let limit = limit.max(1);
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(PaginatedResult::empty());
    }
    let (after_rank, after_id) = match cursor {
        Some(c) => {
            let rank: i64 = c.last_sort_value.parse().map_err(|_| StorageError::Serialization {
                message: format!("bad search cursor rank '{}'", c.last_sort_value),
            })?;
            (rank, c.last_id.clone())
        }
        None => (-1, String::new()),
    };

    let ranked = format!(
        "SELECT {FUNCTION_COLUMNS},
                CASE WHEN lower(name) = ?1 THEN 0
                     WHEN substr(lower(name), 1, length(?1)) = ?1 THEN 1
                     ELSE 2 END AS rank
         FROM functions
         WHERE instr(lower(name), ?1) > 0
            OR instr(lower(qualified_name), ?1) > 0
            OR instr(lower(file), ?1) > 0"
    );
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM ({ranked})"),
        params![needle],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare_cached(&format!(
        "SELECT * FROM ({ranked}) WHERE (rank, id) > (?2, ?3) ORDER BY rank, id LIMIT ?4"
    ))?;
    let rows = stmt.query_map(
        params![needle, after_rank, after_id, (limit + 1) as i64],
        |row| Ok((row.get::<_, i64>(16)?, function_from_row(row)?)),
    )?;
    let mut keyed = Vec::new();
    for row in rows {
        let (rank, record) = row?;
        keyed.push((rank.to_string(), record.id.clone(), record));
    }
    Ok(page(keyed, total, limit))
}
