//! Call graph types: nodes, edges, resolution strategies, entry points, stats.

use std::collections::BTreeMap;
use std::time::Duration;

use calltrace_core::errors::ExtractionError;
use calltrace_core::types::collections::FxHashMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::scanner::language_detect::Language;

use super::resolution::ResolutionDiagnostics;

/// Confidence of a method resolved through an ancestor.
pub const INHERITED_METHOD_CONFIDENCE: f32 = 0.85;

/// Confidence of an export-based match that needed the lexicographic tie-break.
pub const AMBIGUOUS_EXPORT_CONFIDENCE: f32 = 0.50;

/// The call graph: a directed graph of function calls.
///
/// Node indices stay valid when other nodes are removed. A freed slot may be
/// reused by a later insertion, so long-lived references go through
/// [`NodeHandle`], whose generation detects reuse.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub(crate) graph: StableGraph<FunctionNode, CallEdge, Directed>,
    /// Function id → NodeIndex.
    pub(crate) node_index: FxHashMap<String, NodeIndex>,
    /// File → nodes defined in it, for bulk invalidation.
    pub(crate) file_nodes: FxHashMap<String, Vec<NodeIndex>>,
    /// Per-slot generation, bumped whenever the slot's node is removed.
    generations: Vec<u32>,
}

/// Generation-checked reference to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub index: NodeIndex,
    pub generation: u32,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of functions (nodes) in the graph.
    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of call edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node index by function id.
    pub fn get_node(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    /// Look up a function by id.
    pub fn function(&self, id: &str) -> Option<&FunctionNode> {
        self.get_node(id).and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn node_weight(&self, idx: NodeIndex) -> Option<&FunctionNode> {
        self.graph.node_weight(idx)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Generation-checked handle for a function id.
    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        let index = self.get_node(id)?;
        Some(NodeHandle {
            index,
            generation: self.generation_of(index),
        })
    }

    /// Dereference a handle. Returns `None` if the node was removed, even if
    /// its slot now holds a different function.
    pub fn resolve_handle(&self, handle: NodeHandle) -> Option<&FunctionNode> {
        if self.generation_of(handle.index) != handle.generation {
            return None;
        }
        self.graph.node_weight(handle.index)
    }

    fn generation_of(&self, idx: NodeIndex) -> u32 {
        self.generations.get(idx.index()).copied().unwrap_or(0)
    }

    /// Get all nodes for a given file.
    pub fn get_file_nodes(&self, file: &str) -> &[NodeIndex] {
        self.file_nodes
            .get(file)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Files that currently own at least one function.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.file_nodes.keys().map(|k| k.as_str())
    }

    /// All functions, in no particular order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionNode> {
        self.graph.node_weights()
    }

    /// Add a function node. If a function with the same id exists, its
    /// weight is replaced in place and the existing index is returned.
    pub fn add_function(&mut self, node: FunctionNode) -> NodeIndex {
        if let Some(&existing) = self.node_index.get(&node.id) {
            if let Some(slot) = self.graph.node_weight_mut(existing) {
                *slot = node;
            }
            return existing;
        }
        let id = node.id.clone();
        let file = node.file.clone();
        let idx = self.graph.add_node(node);
        if self.generations.len() <= idx.index() {
            self.generations.resize(idx.index() + 1, 0);
        }
        self.node_index.insert(id, idx);
        self.file_nodes.entry(file).or_default().push(idx);
        idx
    }

    /// Remove one function and every edge touching it.
    pub fn remove_function(&mut self, id: &str) -> Option<FunctionNode> {
        let idx = self.node_index.remove(id)?;
        let node = self.graph.remove_node(idx)?;
        if let Some(slot) = self.generations.get_mut(idx.index()) {
            *slot = slot.wrapping_add(1);
        }
        if let Some(nodes) = self.file_nodes.get_mut(&node.file) {
            nodes.retain(|n| *n != idx);
            if nodes.is_empty() {
                self.file_nodes.remove(&node.file);
            }
        }
        Some(node)
    }

    /// Remove all nodes and edges for a given file. Returns the removed ids.
    pub fn remove_file(&mut self, file: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .get_file_nodes(file)
            .iter()
            .filter_map(|idx| self.graph.node_weight(*idx).map(|n| n.id.clone()))
            .collect();
        for id in &ids {
            self.remove_function(id);
        }
        ids
    }

    /// Add a call edge. The edge is only inserted when both endpoints exist
    /// and no edge with the same `(caller, callee, line)` identity is present.
    pub fn add_edge(&mut self, caller: &str, callee: &str, edge: CallEdge) -> bool {
        let (Some(from), Some(to)) = (self.get_node(caller), self.get_node(callee)) else {
            return false;
        };
        let duplicate = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && e.weight().call_site_line == edge.call_site_line);
        if duplicate {
            return false;
        }
        self.graph.add_edge(from, to, edge);
        true
    }

    /// Drop every outgoing edge of `id`. Returns how many were removed.
    pub fn remove_outgoing_edges(&mut self, id: &str) -> usize {
        let Some(idx) = self.get_node(id) else {
            return 0;
        };
        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for e in &edges {
            self.graph.remove_edge(*e);
        }
        edges.len()
    }

    /// Replace the entry-point classification of a function.
    pub fn set_entry_point(&mut self, id: &str, entry: Option<EntryPoint>) -> bool {
        match self
            .get_node(id)
            .and_then(|idx| self.graph.node_weight_mut(idx))
        {
            Some(node) => {
                node.entry_point = entry;
                true
            }
            None => false,
        }
    }

    /// Outgoing edges of a function as `(callee, edge)`.
    pub fn callees(&self, id: &str) -> Vec<(&FunctionNode, &CallEdge)> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Incoming edges of a function as `(caller, edge)`.
    pub fn callers(&self, id: &str) -> Vec<(&FunctionNode, &CallEdge)> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<(&FunctionNode, &CallEdge)> {
        let Some(idx) = self.get_node(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph.node_weight(other).map(|n| (n, e.weight()))
            })
            .collect()
    }

    /// Number of functions flagged as entry points.
    pub fn entry_point_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| n.entry_point.is_some())
            .count()
    }

    /// Strongly connected components with more than one node, plus self-loops.
    pub fn cycle_count(&self) -> usize {
        petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || (scc.len() == 1 && self.graph.find_edge(scc[0], scc[0]).is_some())
            })
            .count()
    }

    /// Every edge as an owned, totally ordered view. Two graphs with the same
    /// functions and edges produce identical vectors regardless of insertion
    /// order or slot reuse.
    pub fn canonical_edges(&self) -> Vec<EdgeView> {
        let mut edges: Vec<EdgeView> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                let caller = self.graph.node_weight(e.source())?;
                let callee = self.graph.node_weight(e.target())?;
                Some(EdgeView {
                    caller: caller.id.clone(),
                    callee: callee.id.clone(),
                    call_site_line: e.weight().call_site_line,
                    resolution: e.weight().resolution,
                    confidence: e.weight().confidence,
                })
            })
            .collect();
        edges.sort_by(|a, b| {
            (&a.caller, &a.callee, a.call_site_line).cmp(&(&b.caller, &b.callee, b.call_site_line))
        });
        edges
    }

    /// Every function, ordered by id.
    pub fn canonical_functions(&self) -> Vec<FunctionNode> {
        let mut nodes: Vec<FunctionNode> = self.graph.node_weights().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// True when every edge's endpoints are live functions of this graph and
    /// the id and file indices agree with the node set.
    pub fn is_consistent(&self) -> bool {
        let edges_ok = self.graph.edge_references().all(|e| {
            self.graph.node_weight(e.source()).is_some() && self.graph.node_weight(e.target()).is_some()
        });
        let index_ok = self.node_index.len() == self.graph.node_count()
            && self.node_index.iter().all(|(id, idx)| {
                self.graph
                    .node_weight(*idx)
                    .map(|n| &n.id == id)
                    .unwrap_or(false)
            });
        let files_ok = self.file_nodes.values().map(|v| v.len()).sum::<usize>()
            == self.graph.node_count();
        edges_ok && index_ok && files_ok
    }
}

/// A function node in the call graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    /// `file::qualified_name`, unique within a build.
    pub id: String,
    pub file: String,
    pub name: String,
    pub qualified_name: String,
    pub class_name: Option<String>,
    pub language: Language,
    pub line: u32,
    pub end_line: u32,
    pub is_exported: bool,
    pub signature_hash: u64,
    pub body_hash: u64,
    pub return_type: Option<String>,
    pub entry_point: Option<EntryPoint>,
}

impl FunctionNode {
    pub fn is_entry_point(&self) -> bool {
        self.entry_point.is_some()
    }
}

/// A call edge in the call graph. Never mutated after insertion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    pub resolution: Resolution,
    pub confidence: f32,
    pub call_site_line: u32,
}

/// Owned view of one edge, used for comparisons and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub caller: String,
    pub callee: String,
    pub call_site_line: u32,
    pub resolution: Resolution,
    pub confidence: f32,
}

/// Resolution strategy used to resolve a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    /// Same-file direct call. Confidence: 0.95.
    SameFile,
    /// Method call on a known receiver type. Confidence: 0.90 (0.85 inherited).
    MethodCall,
    /// DI injection resolution. Confidence: 0.80.
    DiInjection,
    /// Import-based resolution. Confidence: 0.75.
    ImportBased,
    /// Export-based cross-module resolution. Confidence: 0.60 (0.50 ambiguous).
    ExportBased,
    /// Fuzzy name matching on a project-unique name. Confidence: 0.40.
    Fuzzy,
}

impl Resolution {
    /// Default confidence for this resolution strategy.
    pub fn default_confidence(&self) -> f32 {
        match self {
            Self::SameFile => 0.95,
            Self::MethodCall => 0.90,
            Self::DiInjection => 0.80,
            Self::ImportBased => 0.75,
            Self::ExportBased => 0.60,
            Self::Fuzzy => 0.40,
        }
    }

    /// Name of the resolution strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SameFile => "same_file",
            Self::MethodCall => "method_call",
            Self::DiInjection => "di_injection",
            Self::ImportBased => "import_based",
            Self::ExportBased => "export_based",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Inverse of [`Resolution::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all_ordered().iter().copied().find(|r| r.name() == name)
    }

    /// All resolution strategies in fallback order.
    pub fn all_ordered() -> &'static [Resolution] {
        &[
            Self::SameFile,
            Self::MethodCall,
            Self::DiInjection,
            Self::ImportBased,
            Self::ExportBased,
            Self::Fuzzy,
        ]
    }

    /// Position in the fallback order.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a function is considered reachable from outside the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryPointKind {
    RouteHandler,
    ControllerMethod,
    ExportedHandler,
    MainFunction,
    FrameworkEntry,
}

impl EntryPointKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RouteHandler => "route_handler",
            Self::ControllerMethod => "controller_method",
            Self::ExportedHandler => "exported_handler",
            Self::MainFunction => "main_function",
            Self::FrameworkEntry => "framework_entry",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::RouteHandler,
            Self::ControllerMethod,
            Self::ExportedHandler,
            Self::MainFunction,
            Self::FrameworkEntry,
        ]
        .into_iter()
        .find(|k| k.name() == name)
    }
}

/// Entry-point classification attached to a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub kind: EntryPointKind,
    /// Route path, e.g. `/users/:id`.
    pub route: Option<String>,
    /// HTTP method or equivalent verb.
    pub method: Option<String>,
    /// Framework that produced a `FrameworkEntry` match.
    pub framework: Option<String>,
    pub confidence: f32,
}

impl EntryPoint {
    pub fn new(kind: EntryPointKind, confidence: f32) -> Self {
        Self {
            kind,
            route: None,
            method: None,
            framework: None,
            confidence,
        }
    }

    pub fn framework(framework: &str, confidence: f32) -> Self {
        Self {
            framework: Some(framework.to_string()),
            ..Self::new(EntryPointKind::FrameworkEntry, confidence)
        }
    }
}

/// Overall outcome of a build or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    /// Every input file was extracted.
    Complete,
    /// Some files failed extraction and were left out.
    Partial,
    /// Cancellation was requested; files processed before it are included.
    Cancelled,
}

impl BuildStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One file that could not be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure {
    pub file: String,
    pub error: ExtractionError,
}

/// Statistics from a call graph build or update.
#[derive(Debug, Clone, Default)]
pub struct CallGraphStats {
    pub total_functions: usize,
    pub total_edges: usize,
    pub entry_points: usize,
    pub files: usize,
    pub resolution_counts: BTreeMap<String, usize>,
    pub resolution_rate: f64,
    pub build_duration: Duration,
    pub cycles_detected: usize,
    /// Call sites outside any function body; not resolvable to a caller.
    pub orphan_call_sites: usize,
    pub diagnostics: ResolutionDiagnostics,
}

/// What an incremental update touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_removed: usize,
    pub functions_added: usize,
    pub functions_removed: usize,
    pub functions_updated: usize,
    pub signature_changes: usize,
    /// Callers outside the changed files whose call sites were re-resolved.
    pub incoming_reresolved: usize,
}

/// Result of a build or incremental update.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub status: BuildStatus,
    pub stats: CallGraphStats,
    pub failures: Vec<ExtractionFailure>,
    /// Files left untouched because cancellation arrived first.
    pub skipped_files: Vec<String>,
    pub warnings: Vec<String>,
    pub update: Option<UpdateSummary>,
}

impl BuildReport {
    /// True when the build produced a graph, even with unresolved calls.
    pub fn succeeded(&self) -> bool {
        self.status != BuildStatus::Cancelled
    }
}
