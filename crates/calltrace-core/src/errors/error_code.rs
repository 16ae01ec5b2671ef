//! ErrorCode trait for structured error reporting.

/// Every error enum implements this to provide a stable code string that
/// callers outside the process can match on.
pub trait ErrorCode {
    /// Returns the error code string (e.g., "STORAGE_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted string: `[ERROR_CODE] message`.
    fn coded_message(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const EXTRACTION_ERROR: &str = "EXTRACTION_ERROR";
pub const CALL_GRAPH_ERROR: &str = "CALL_GRAPH_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const DB_BUSY: &str = "DB_BUSY";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const QUERY_ERROR: &str = "QUERY_ERROR";
pub const CANCELLED: &str = "CANCELLED";
