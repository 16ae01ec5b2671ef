//! Call graph engine: extraction, six-strategy resolution, stable petgraph
//! storage, entry-point detection, and incremental maintenance.
//!
//! Pipeline: extract (parallel) → index (barrier) → resolve → build → entry
//! points → persist. Incremental updates replace the first four stages for
//! the changed files only.

pub mod builder;
pub mod data_access;
pub mod di_support;
pub mod entry_points;
pub mod extractor;
pub mod import_paths;
pub mod incremental;
pub mod index;
pub mod invalidation;
pub mod parallel;
pub mod persistence;
pub mod resolution;
pub mod types;

pub use builder::CallGraphBuilder;
pub use entry_points::EntryPointDetector;
pub use extractor::{extract_file, ExtractedFile, ExtractedFunction, NormalizedCallSite};
pub use incremental::{IncrementalCallGraph, UpdatePhase};
pub use index::ResolutionIndex;
pub use resolution::{resolve_call, ResolutionDiagnostics, ResolvedCall, Resolver};
pub use types::{
    BuildReport, BuildStatus, CallEdge, CallGraph, CallGraphStats, EdgeView, EntryPoint,
    EntryPointKind, ExtractionFailure, FunctionNode, NodeHandle, Resolution, UpdateSummary,
};
