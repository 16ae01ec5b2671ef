//! SqliteGraphStore: the `GraphStore` implementation.
//!
//! Writes go through the batch writer thread and return only after commit;
//! reads use the read-only pool and therefore only ever see committed
//! changesets.

use std::path::Path;

use calltrace_core::config::StorageConfig;
use calltrace_core::errors::StorageError;
use calltrace_core::traits::{
    CallEdgeRecord, DataAccessRecord, ExtractionRecord, FunctionRecord, GraphChangeset,
    GraphStore, TraversalDirection, TraversalRow,
};
use calltrace_core::types::pagination::{PaginatedResult, PaginationCursor};

use crate::batch::{BatchWriter, WriteStats};
use crate::connection::DatabaseManager;
use crate::queries::build_log::{self, BuildLogEntry};
use crate::queries::{call_edges, data_access, extractions, functions, listing, traversal};

#[derive(Debug)]
pub struct SqliteGraphStore {
    db: DatabaseManager,
    writer: BatchWriter,
}

impl SqliteGraphStore {
    /// Open (creating if needed) the database at `path` and start the writer.
    pub fn open(path: &Path, config: &StorageConfig) -> Result<Self, StorageError> {
        let db = DatabaseManager::open(path, config.effective_read_pool_size())?;
        let conn = db.open_batch_connection()?;
        let writer = BatchWriter::new(
            conn,
            config.effective_channel_capacity(),
            config.effective_batch_size(),
        )?;
        tracing::info!(path = %path.display(), "graph store opened");
        Ok(Self { db, writer })
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Apply a changeset and report the rows it touched.
    pub fn apply_with_stats(&self, changeset: GraphChangeset) -> Result<WriteStats, StorageError> {
        if changeset.is_empty() {
            return Ok(WriteStats::default());
        }
        self.writer.apply(changeset)
    }

    pub fn edge_count(&self) -> Result<usize, StorageError> {
        self.db.with_reader(call_edges::count_call_edges)
    }

    /// Edge counts per resolution strategy.
    pub fn edges_by_resolution(&self) -> Result<Vec<(String, usize)>, StorageError> {
        self.db.with_reader(call_edges::count_by_resolution)
    }

    /// Functions that read or write `table`.
    pub fn data_access_for_table(&self, table: &str) -> Result<Vec<DataAccessRecord>, StorageError> {
        self.db.with_reader(|conn| data_access::get_by_table(conn, table))
    }

    pub fn recent_builds(&self, limit: usize) -> Result<Vec<BuildLogEntry>, StorageError> {
        self.db.with_reader(|conn| build_log::recent(conn, limit))
    }

    /// Wait for queued writes, then truncate the WAL.
    pub fn checkpoint(&self) -> Result<i64, StorageError> {
        self.writer.flush()?;
        self.db.checkpoint()
    }
}

impl GraphStore for SqliteGraphStore {
    fn apply_changeset(&self, changeset: GraphChangeset) -> Result<(), StorageError> {
        self.apply_with_stats(changeset).map(|_| ())
    }

    fn get_function(&self, id: &str) -> Result<Option<FunctionRecord>, StorageError> {
        self.db.with_reader(|conn| functions::get_function(conn, id))
    }

    fn functions_in_file(&self, file: &str) -> Result<Vec<FunctionRecord>, StorageError> {
        self.db
            .with_reader(|conn| functions::get_functions_by_file(conn, file))
    }

    fn function_count(&self) -> Result<usize, StorageError> {
        self.db.with_reader(functions::count_functions)
    }

    fn edges_from(&self, caller_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError> {
        self.db
            .with_reader(|conn| call_edges::get_edges_by_caller(conn, caller_id))
    }

    fn edges_to(&self, callee_id: &str) -> Result<Vec<CallEdgeRecord>, StorageError> {
        self.db
            .with_reader(|conn| call_edges::get_edges_by_callee(conn, callee_id))
    }

    fn load_extractions(
        &self,
        files: Option<&[String]>,
    ) -> Result<Vec<ExtractionRecord>, StorageError> {
        self.db.with_reader(|conn| match files {
            Some(files) => extractions::load_files(conn, files),
            None => extractions::load_all(conn),
        })
    }

    fn traverse(
        &self,
        start: &str,
        direction: TraversalDirection,
        max_depth: u32,
    ) -> Result<Vec<TraversalRow>, StorageError> {
        self.db
            .with_reader(|conn| traversal::traverse(conn, start, direction, max_depth))
    }

    fn shortest_path(
        &self,
        from: &str,
        to: &str,
        max_depth: u32,
    ) -> Result<Option<Vec<CallEdgeRecord>>, StorageError> {
        self.db
            .with_reader(|conn| traversal::shortest_path(conn, from, to, max_depth))
    }

    fn entry_points(
        &self,
        cursor: Option<&PaginationCursor>,
        limit: usize,
    ) -> Result<PaginatedResult<FunctionRecord>, StorageError> {
        self.db
            .with_reader(|conn| listing::entry_points(conn, cursor, limit))
    }

    fn search_functions(
        &self,
        query: &str,
        cursor: Option<&PaginationCursor>,
        limit: usize,
    ) -> Result<PaginatedResult<FunctionRecord>, StorageError> {
        self.db
            .with_reader(|conn| listing::search_functions(conn, query, cursor, limit))
    }
}
