//! calltrace-analysis: turns parsed files into a confidence-scored call graph
//! and keeps it current as files change.

pub mod call_graph;
pub mod parsers;
pub mod query;
pub mod scanner;
pub mod service;

pub use call_graph::{BuildReport, BuildStatus, CallGraph, IncrementalCallGraph, Resolution};
pub use service::CallGraphService;
