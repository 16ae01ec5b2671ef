//! V001: call graph schema.
//! functions, call_edges, data_access, extractions.

pub const MIGRATION_SQL: &str = r#"
-- One row per function node. Ids are "<file>::<qualified name>".
-- Hashes are u64 stored bit-for-bit as INTEGER.
CREATE TABLE IF NOT EXISTS functions (
    id TEXT PRIMARY KEY,
    file TEXT NOT NULL,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    language TEXT NOT NULL,
    line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    is_exported INTEGER NOT NULL DEFAULT 0,
    signature_hash INTEGER NOT NULL,
    body_hash INTEGER NOT NULL,
    return_type TEXT,
    entry_kind TEXT,
    entry_route TEXT,
    entry_method TEXT,
    entry_framework TEXT,
    entry_confidence REAL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_functions_file ON functions(file);
CREATE INDEX IF NOT EXISTS idx_functions_name ON functions(name);
CREATE INDEX IF NOT EXISTS idx_functions_entry
    ON functions(id) WHERE entry_kind IS NOT NULL;

-- Resolved call edges. Removing a function removes its edges.
CREATE TABLE IF NOT EXISTS call_edges (
    caller_id TEXT NOT NULL REFERENCES functions(id) ON DELETE CASCADE,
    callee_id TEXT NOT NULL REFERENCES functions(id) ON DELETE CASCADE,
    call_site_line INTEGER NOT NULL,
    resolution TEXT NOT NULL,
    confidence REAL NOT NULL,
    PRIMARY KEY (caller_id, callee_id, call_site_line)
) STRICT, WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_call_edges_callee ON call_edges(callee_id);

-- ORM and raw-SQL mentions found inside functions.
CREATE TABLE IF NOT EXISTS data_access (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id TEXT NOT NULL,
    file TEXT NOT NULL,
    table_name TEXT,
    operation TEXT NOT NULL,
    line INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_data_access_file ON data_access(file);
CREATE INDEX IF NOT EXISTS idx_data_access_function ON data_access(function_id);
CREATE INDEX IF NOT EXISTS idx_data_access_table ON data_access(table_name)
    WHERE table_name IS NOT NULL;

-- Serialized per-file extraction, used to rebuild the resolution index
-- without re-parsing.
CREATE TABLE IF NOT EXISTS extractions (
    file TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    payload TEXT NOT NULL
) STRICT;
"#;
