//! calltrace-storage: SQLite persistence for the call graph.
//!
//! One dedicated writer thread applies changesets in `BEGIN IMMEDIATE`
//! transactions; reads go through a small pool of read-only connections.

pub mod batch;
pub mod connection;
pub mod migrations;
pub mod queries;
pub mod store;

pub use connection::DatabaseManager;
pub use store::SqliteGraphStore;
