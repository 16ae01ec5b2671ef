//! Commands accepted by the writer thread.

use calltrace_core::errors::StorageError;
use calltrace_core::traits::GraphChangeset;
use crossbeam_channel::Sender;

pub enum BatchCommand {
    /// Apply a changeset atomically and report the outcome on `ack`.
    Apply {
        changeset: GraphChangeset,
        ack: Sender<Result<WriteStats, StorageError>>,
    },
    /// Reply once every earlier command has been processed.
    Flush(Sender<()>),
    Shutdown,
}

impl std::fmt::Debug for BatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply { changeset, .. } => f
                .debug_struct("Apply")
                .field("rows", &changeset.row_count())
                .field("replace_all", &changeset.replace_all)
                .finish(),
            Self::Flush(_) => f.write_str("Flush"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Rows touched by one changeset, or accumulated over the writer's life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub changesets: usize,
    pub functions_written: usize,
    pub functions_deleted: usize,
    pub edges_written: usize,
    pub edges_deleted: usize,
    pub data_access_rows: usize,
    pub extraction_rows: usize,
}

impl WriteStats {
    pub fn add(&mut self, other: &WriteStats) {
        self.changesets += other.changesets;
        self.functions_written += other.functions_written;
        self.functions_deleted += other.functions_deleted;
        self.edges_written += other.edges_written;
        self.edges_deleted += other.edges_deleted;
        self.data_access_rows += other.data_access_rows;
        self.extraction_rows += other.extraction_rows;
    }

    pub fn rows(&self) -> usize {
        self.functions_written
            + self.functions_deleted
            + self.edges_written
            + self.edges_deleted
            + self.data_access_rows
            + self.extraction_rows
    }
}
