//! SQL for each table, plus the recursive traversal and keyset listings.

pub mod build_log;
pub mod call_edges;
pub mod data_access;
pub mod extractions;
pub mod functions;
pub mod listing;
pub mod traversal;

/// u64 hashes are stored bit-for-bit in SQLite's signed INTEGER.
pub(crate) fn hash_to_sql(hash: u64) -> i64 {
    hash as i64
}

pub(crate) fn hash_from_sql(value: i64) -> u64 {
    value as u64
}
