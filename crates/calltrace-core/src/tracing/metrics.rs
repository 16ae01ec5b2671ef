//! Structured span field names shared across subsystems.
//!
//! Using the same field names everywhere keeps log queries uniform.

/// Files skipped because extraction failed.
pub const FILES_FAILED: &str = "files_failed";

/// Functions in the resulting graph.
pub const FUNCTIONS: &str = "functions";

/// Edges in the resulting graph.
pub const EDGES: &str = "edges";

/// Wall time of a stage in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Resolved / total call sites (0.0 - 1.0).
pub const RESOLUTION_RATE: &str = "resolution_rate";

/// Call sites re-resolved because a callee signature changed.
pub const INCOMING_RERESOLVED: &str = "incoming_reresolved";

/// Storage: batch write time in milliseconds.
pub const BATCH_WRITE_TIME: &str = "batch_write_time";

/// Query cache hit rate (0.0 - 1.0).
pub const CACHE_HIT_RATE: &str = "cache_hit_rate";
