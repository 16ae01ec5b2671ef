//! Query layer errors.

use super::error_code::{self, ErrorCode};
use super::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown function: {id}")]
    UnknownFunction { id: String },

    #[error("Invalid pagination cursor")]
    InvalidCursor,

    #[error("Storage fallback failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Storage fallback required for {function_count} functions but no store is attached")]
    NoStore { function_count: usize },

    #[error("Call graph of {function_count} functions is held by the store, not in memory")]
    StorageBacked { function_count: usize },

    #[error("Snapshot lock poisoned: {0}")]
    LockPoisoned(String),
}

impl ErrorCode for QueryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            _ => error_code::QUERY_ERROR,
        }
    }
}
