//! Error handling for calltrace.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod call_graph_error;
pub mod config_error;
pub mod error_code;
pub mod extraction_error;
pub mod query_error;
pub mod storage_error;

pub use call_graph_error::CallGraphError;
pub use config_error::ConfigError;
pub use error_code::ErrorCode;
pub use extraction_error::ExtractionError;
pub use query_error::QueryError;
pub use storage_error::StorageError;
