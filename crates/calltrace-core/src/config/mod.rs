//! Configuration system for calltrace.
//! TOML-based, layered resolution: CLI > env > project > user > defaults.

pub mod calltrace_config;
pub mod entry_point_config;
pub mod extraction_config;
pub mod query_config;
pub mod resolution_config;
pub mod storage_config;

pub use calltrace_config::{CalltraceConfig, CliOverrides};
pub use entry_point_config::EntryPointConfig;
pub use extraction_config::ExtractionConfig;
pub use query_config::QueryConfig;
pub use resolution_config::ResolutionConfig;
pub use storage_config::StorageConfig;
