//! Storage collaborator seam.
//!
//! The engine writes graph changes as one atomic changeset and reads back
//! point lookups, per-file extraction payloads, and recursive traversals
//! (used when the graph is too large to query in memory).

use serde::{Deserialize, Serialize};

use crate::errors::StorageError;
use crate::types::pagination::{PaginatedResult, PaginationCursor};

/// Direction of a traversal over call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraversalDirection {
    /// Caller to callee.
    Forward,
    /// Callee to caller.
    Inverse,
}

/// Persisted entry-point classification of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPointRecord {
    pub kind: String,
    pub route: Option<String>,
    pub method: Option<String>,
    pub framework: Option<String>,
    pub confidence: f32,
}

/// A function row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: String,
    pub file: String,
    pub name: String,
    pub qualified_name: String,
    pub language: String,
    pub line: u32,
    pub end_line: u32,
    pub is_exported: bool,
    pub signature_hash: u64,
    pub body_hash: u64,
    pub return_type: Option<String>,
    pub entry_point: Option<EntryPointRecord>,
}

/// A call edge row. Identity is `(caller_id, callee_id, call_site_line)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdgeRecord {
    pub caller_id: String,
    pub callee_id: String,
    pub call_site_line: u32,
    pub resolution: String,
    pub confidence: f32,
}

/// A data-access mention row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAccessRecord {
    pub function_id: String,
    pub file: String,
    /// `None` when the statement's table could not be inferred (raw queries).
    pub table_name: Option<String>,
    pub operation: String,
    pub line: u32,
}

/// Serialized per-file extraction bundle, used to rebuild the resolution
/// index for unchanged files without re-parsing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub file: String,
    pub language: String,
    pub payload: String,
}

/// One row of a traversal result: a function and its shortest depth from
/// the start node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalRow {
    pub function_id: String,
    pub depth: u32,
}

/// Everything one build or incremental update writes, applied in a single
/// transaction. Deletions are applied before insertions.
#[derive(Debug, Clone, Default)]
pub struct GraphChangeset {
    /// Wipe every table before applying the rest (full rebuild).
    pub replace_all: bool,
    /// Files whose data-access rows and extraction payloads are dropped.
    pub removed_files: Vec<String>,
    /// Functions deleted outright; their edges go with them.
    pub removed_functions: Vec<String>,
    /// Callers whose outgoing edges are dropped before `edges` is inserted.
    pub cleared_callers: Vec<String>,
    /// Functions inserted or updated in place.
    pub functions: Vec<FunctionRecord>,
    pub edges: Vec<CallEdgeRecord>,
    pub data_access: Vec<DataAccessRecord>,
    pub extractions: Vec<ExtractionRecord>,
}

impl GraphChangeset {
    pub fn is_empty(&self) -> bool {
        !self.replace_all
            && self.removed_files.is_empty()
            && self.removed_functions.is_empty()
            && self.cleared_callers.is_empty()
            && self.functions.is_empty()
            && self.edges.is_empty()
            && self.data_access.is_empty()
            && self.extractions.is_empty()
    }

    /// Total rows written or deleted, for logging.
    pub fn row_count(&self) -> usize {
        self.removed_files.len()
            + self.removed_functions.len()
            + self.cleared_callers.len()
            + self.functions.len()
            + self.edges.len()
            + self.data_access.len()
            + self.extractions.len()
    }
}

/// The storage collaborator.
pub trait GraphStore: Send + Sync {
    /// Apply a changeset atomically: either every row lands or none does.
    fn apply_changeset(&self, changeset: GraphChangeset) -> Result<(), StorageError>;

    fn get_function(&self, id: &str) -> Result<Option<FunctionRecord>, StorageError>;

    fn functions_in_file(&self, file: &str) -> Result<Vec<FunctionRecord>, StorageError>;

    fn function_count(&self) -> Result<usize, StorageError>;

    fn edges_from(&self, caller_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError>;

    fn edges_to(&self, callee_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError>;

    /// Load stored extraction payloads. `None` loads every file.
    fn load_extractions(
        &self,
        files: Option<&[String]>,
    ) -> Result<Vec<ExtractionRecord>, StorageError>;

    /// Functions reachable from `start` within `max_depth` hops, each with
    /// its shortest depth. The start node itself is not included.
    fn traverse(
        &self,
        start: &str,
        direction: TraversalDirection,
        max_depth: u32,
    ) -> Result<Vec<TraversalRow>, StorageError>;

    /// Edges of one shortest forward path from `from` to `to`, or `None`
    /// when `to` is not reachable within `max_depth` hops.
    fn shortest_path(
        &self,
        from: &str,
        to: &str,
        max_depth: u32,
    ) -> Result<Option<Vec<CallEdgeRecord>>, StorageError>;

    /// Entry points ordered by function id.
    fn entry_points(
        &self,
        cursor: Option<&PaginationCursor>,
        limit: usize,
    ) -> Result<PaginatedResult<FunctionRecord>, StorageError>;

    /// Case-insensitive substring search over name, qualified name and file,
    /// ordered by match rank (exact name, name prefix, other) then id.
    fn search_functions(
        &self,
        query: &str,
        cursor: Option<&PaginationCursor>,
        limit: usize,
    ) -> Result<PaginatedResult<FunctionRecord>, StorageError>;
}
