//! Call graph errors.

use super::error_code::{self, ErrorCode};
use super::{ConfigError, StorageError};

/// Fatal errors for a build or incremental update. When one of these is
/// returned the previously installed graph is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum CallGraphError {
    #[error("Index construction failed: {message}")]
    IndexFailed { message: String },

    #[error("Graph mutation failed: {message}")]
    GraphMutation { message: String },

    #[error("Extraction worker pool could not be created: {message}")]
    WorkerPool { message: String },

    #[error("Stored extraction for {file} is unreadable: {message}")]
    CorruptExtraction { file: String, message: String },

    #[error("CTE fallback failed: {message}")]
    CteFallbackFailed { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Build cancelled")]
    Cancelled,
}

impl ErrorCode for CallGraphError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Cancelled => error_code::CANCELLED,
            _ => error_code::CALL_GRAPH_ERROR,
        }
    }
}
