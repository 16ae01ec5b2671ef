//! calltrace-core: errors, configuration, tracing, shared types, and the
//! trait seams (cancellation, storage, events) used by the call-graph engine.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod tracing;
pub mod traits;
pub mod types;
