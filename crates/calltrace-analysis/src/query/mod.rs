//! Read-side queries over a graph snapshot: reachability, shortest paths,
//! neighborhoods, entry points and search.

pub mod cache;
pub mod path_finding;
pub mod traversal;

use calltrace_core::traits::FunctionRecord;
use serde::{Deserialize, Serialize};

use crate::call_graph::types::{EdgeView, FunctionNode};

pub use cache::{CachedResult, QueryCache, QueryKey};
pub use path_finding::find_path;
pub use traversal::{neighborhood, reachable, search_rank};

/// Compact description of a function in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub id: String,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line: u32,
    pub is_exported: bool,
    pub is_entry_point: bool,
}

impl From<&FunctionNode> for FunctionSummary {
    fn from(node: &FunctionNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            qualified_name: node.qualified_name.clone(),
            file: node.file.clone(),
            line: node.line,
            is_exported: node.is_exported,
            is_entry_point: node.is_entry_point(),
        }
    }
}

impl From<&FunctionRecord> for FunctionSummary {
    fn from(record: &FunctionRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            qualified_name: record.qualified_name.clone(),
            file: record.file.clone(),
            line: record.line,
            is_exported: record.is_exported,
            is_entry_point: record.entry_point.is_some(),
        }
    }
}

/// A function reached by a traversal, at its shortest depth from the start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachableFunction {
    pub function: FunctionSummary,
    pub depth: u32,
}

/// One shortest call path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPath {
    /// Function ids from source to target, inclusive.
    pub functions: Vec<String>,
    pub edges: Vec<EdgeView>,
    /// Product of the edge confidences.
    pub confidence: f64,
    /// Lowest-confidence edge; `None` for the empty path.
    pub weakest_link: Option<EdgeView>,
}

impl CallPath {
    /// Path from `from` to itself.
    pub fn trivial(from: &str) -> Self {
        Self {
            functions: vec![from.to_string()],
            edges: Vec::new(),
            confidence: 1.0,
            weakest_link: None,
        }
    }

    /// Build a path from consecutive edges.
    pub fn from_edges(edges: Vec<EdgeView>) -> Option<Self> {
        let first = edges.first()?;
        let mut functions = vec![first.caller.clone()];
        functions.extend(edges.iter().map(|e| e.callee.clone()));
        let confidence = edges.iter().map(|e| e.confidence as f64).product();
        let weakest_link = edges
            .iter()
            .min_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .cloned();
        Some(Self {
            functions,
            edges,
            confidence,
            weakest_link,
        })
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A direct caller or callee, with the edge connecting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub function: FunctionSummary,
    pub edge: EdgeView,
}

/// Direct callers and callees of one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub function: FunctionSummary,
    pub callers: Vec<NeighborEdge>,
    pub callees: Vec<NeighborEdge>,
}
