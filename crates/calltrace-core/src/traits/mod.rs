//! Trait seams shared between the engine and its collaborators.

pub mod cancellation;
pub mod graph_store;

pub use cancellation::{Cancellable, CancellationToken};
pub use graph_store::{
    CallEdgeRecord, DataAccessRecord, EntryPointRecord, ExtractionRecord, FunctionRecord,
    GraphChangeset, GraphStore, TraversalDirection, TraversalRow,
};
