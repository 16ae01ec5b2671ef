//! V002: build log, one row per persisted build or update.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS build_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    applied_at INTEGER NOT NULL DEFAULT (unixepoch()),
    full_rebuild INTEGER NOT NULL,
    rows_written INTEGER NOT NULL,
    function_count INTEGER NOT NULL,
    edge_count INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_build_log_time ON build_log(applied_at DESC);
"#;
