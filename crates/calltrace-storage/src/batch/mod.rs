//! Batch writer: crossbeam-channel bounded queue, one dedicated writer
//! thread, every changeset applied in a single transaction.

pub mod commands;
pub mod writer;

pub use commands::{BatchCommand, WriteStats};
pub use writer::BatchWriter;
