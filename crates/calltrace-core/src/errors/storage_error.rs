//! Storage errors.

use super::error_code::{self, ErrorCode};

/// Errors raised by the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("Database busy: {message}")]
    Busy { message: String },

    #[error("Migration to v{version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Batch writer disconnected")]
    WriterDisconnected,

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Connection lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Self::Busy {
                    message: e.to_string(),
                }
            }
            other => Self::SqliteError {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy { .. } => error_code::DB_BUSY,
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
