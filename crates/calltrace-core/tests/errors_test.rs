//! Tests for error codes and subsystem error conversions.

use calltrace_core::errors::{
    CallGraphError, ConfigError, ErrorCode, ExtractionError, QueryError, StorageError,
};

#[test]
fn coded_message_prefixes_code() {
    let err = ExtractionError::TooManySyntaxErrors {
        file: "src/a.ts".into(),
        error_count: 12,
    };
    assert_eq!(
        err.coded_message(),
        "[EXTRACTION_ERROR] Parse result for src/a.ts reports 12 syntax errors"
    );
    assert_eq!(err.file(), Some("src/a.ts"));
    assert_eq!(ExtractionError::EmptyPath.file(), None);
}

#[test]
fn storage_codes_distinguish_busy_and_migration() {
    assert_eq!(
        StorageError::Busy {
            message: "locked".into()
        }
        .error_code(),
        "DB_BUSY"
    );
    assert_eq!(
        StorageError::MigrationFailed {
            version: 2,
            message: "boom".into()
        }
        .error_code(),
        "MIGRATION_FAILED"
    );
    assert_eq!(StorageError::WriterDisconnected.error_code(), "STORAGE_ERROR");
}

#[test]
fn nested_errors_report_inner_code() {
    let busy = StorageError::Busy {
        message: "locked".into(),
    };
    let graph: CallGraphError = busy.into();
    assert_eq!(graph.error_code(), "DB_BUSY");

    let query: QueryError = StorageError::WriterDisconnected.into();
    assert_eq!(query.error_code(), "STORAGE_ERROR");
    assert_eq!(QueryError::InvalidCursor.error_code(), "QUERY_ERROR");

    assert_eq!(CallGraphError::Cancelled.error_code(), "CANCELLED");
}

#[test]
fn rusqlite_busy_maps_to_busy() {
    let raw = rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".into()),
    );
    assert!(matches!(StorageError::from(raw), StorageError::Busy { .. }));

    let other = rusqlite::Error::QueryReturnedNoRows;
    assert!(matches!(
        StorageError::from(other),
        StorageError::SqliteError { .. }
    ));
}

#[test]
fn config_errors_share_one_code() {
    let err = ConfigError::InvalidValue {
        field: "query.max_depth".into(),
        message: "must be at least 1".into(),
    };
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert_eq!(
        err.to_string(),
        "Invalid config value for query.max_depth: must be at least 1"
    );
}
