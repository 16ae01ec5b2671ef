//! Breadth-first reachability and neighborhood queries.

use std::collections::VecDeque;

use calltrace_core::errors::QueryError;
use calltrace_core::traits::TraversalDirection;
use calltrace_core::types::collections::FxHashSet;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::call_graph::types::{CallEdge, CallGraph, EdgeView, FunctionNode};

use super::{FunctionSummary, NeighborEdge, Neighborhood, ReachableFunction};

fn petgraph_direction(direction: TraversalDirection) -> Direction {
    match direction {
        TraversalDirection::Forward => Direction::Outgoing,
        TraversalDirection::Inverse => Direction::Incoming,
    }
}

/// Every function reachable from `start` within `max_depth` hops, each at its
/// shortest depth. The start itself is excluded. Results are ordered by
/// depth, then id.
pub fn reachable(
    graph: &CallGraph,
    start: &str,
    direction: TraversalDirection,
    max_depth: u32,
) -> Result<Vec<ReachableFunction>, QueryError> {
    let start_idx = graph
        .get_node(start)
        .ok_or_else(|| QueryError::UnknownFunction { id: start.to_string() })?;
    let dir = petgraph_direction(direction);

    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::new();
    let mut result = Vec::new();
    visited.insert(start_idx);
    queue.push_back((start_idx, 0u32));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for neighbor in graph.graph.neighbors_directed(node, dir) {
            if visited.insert(neighbor) {
                if let Some(weight) = graph.node_weight(neighbor) {
                    result.push(ReachableFunction {
                        function: FunctionSummary::from(weight),
                        depth: depth + 1,
                    });
                }
                queue.push_back((neighbor, depth + 1));
            }
        }
    }

    result.sort_by(|a, b| (a.depth, &a.function.id).cmp(&(b.depth, &b.function.id)));
    Ok(result)
}

fn edge_view(caller: &FunctionNode, callee: &FunctionNode, edge: &CallEdge) -> EdgeView {
    EdgeView {
        caller: caller.id.clone(),
        callee: callee.id.clone(),
        call_site_line: edge.call_site_line,
        resolution: edge.resolution,
        confidence: edge.confidence,
    }
}

/// Direct callers and callees of `id`, ordered by (function id, line).
pub fn neighborhood(graph: &CallGraph, id: &str) -> Result<Neighborhood, QueryError> {
    let idx = graph
        .get_node(id)
        .ok_or_else(|| QueryError::UnknownFunction { id: id.to_string() })?;
    let Some(node) = graph.node_weight(idx) else {
        return Err(QueryError::UnknownFunction { id: id.to_string() });
    };

    let mut callees = Vec::new();
    for e in graph.graph.edges_directed(idx, Direction::Outgoing) {
        if let Some(target) = graph.node_weight(e.target()) {
            callees.push(NeighborEdge {
                function: FunctionSummary::from(target),
                edge: edge_view(node, target, e.weight()),
            });
        }
    }
    let mut callers = Vec::new();
    for e in graph.graph.edges_directed(idx, Direction::Incoming) {
        if let Some(source) = graph.node_weight(e.source()) {
            callers.push(NeighborEdge {
                function: FunctionSummary::from(source),
                edge: edge_view(source, node, e.weight()),
            });
        }
    }
    let order = |a: &NeighborEdge, b: &NeighborEdge| {
        (&a.function.id, a.edge.call_site_line).cmp(&(&b.function.id, b.edge.call_site_line))
    };
    callers.sort_by(order);
    callees.sort_by(order);

    Ok(Neighborhood {
        function: FunctionSummary::from(node),
        callers,
        callees,
    })
}

/// Match rank of a function for a lowercase query: 0 exact name, 1 name
/// prefix, 2 any other substring of name, qualified name or file.
/// `None` when the function does not match.
pub fn search_rank(node: &FunctionNode, query_lower: &str) -> Option<u8> {
    let name = node.name.to_lowercase();
    if name == query_lower {
        Some(0)
    } else if name.starts_with(query_lower) {
        Some(1)
    } else if name.contains(query_lower)
        || node.qualified_name.to_lowercase().contains(query_lower)
        || node.file.to_lowercase().contains(query_lower)
    {
        Some(2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::types::Resolution;
    use crate::scanner::language_detect::Language;

    fn node(id: &str) -> FunctionNode {
        FunctionNode {
            id: id.into(),
            file: "src/x.ts".into(),
            name: id.into(),
            qualified_name: id.into(),
            class_name: None,
            language: Language::TypeScript,
            line: 1,
            end_line: 2,
            is_exported: false,
            signature_hash: 0,
            body_hash: 0,
            return_type: None,
            entry_point: None,
        }
    }

    fn edge(line: u32) -> CallEdge {
        CallEdge {
            resolution: Resolution::SameFile,
            confidence: 0.95,
            call_site_line: line,
        }
    }

    /// a → b → c → d, plus a shortcut a → c.
    fn diamond() -> CallGraph {
        let mut g = CallGraph::new();
        for id in ["a", "b", "c", "d"] {
            g.add_function(node(id));
        }
        g.add_edge("a", "b", edge(1));
        g.add_edge("b", "c", edge(2));
        g.add_edge("c", "d", edge(3));
        g.add_edge("a", "c", edge(4));
        g
    }

    #[test]
    fn depths_are_shortest() {
        let g = diamond();
        let out = reachable(&g, "a", TraversalDirection::Forward, 10).unwrap();
        let depths: Vec<(&str, u32)> = out.iter().map(|r| (r.function.id.as_str(), r.depth)).collect();
        assert_eq!(depths, vec![("b", 1), ("c", 1), ("d", 2)]);
    }

    #[test]
    fn max_depth_bounds_the_walk() {
        let g = diamond();
        let out = reachable(&g, "a", TraversalDirection::Forward, 1).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn inverse_walks_callers() {
        let g = diamond();
        let out = reachable(&g, "d", TraversalDirection::Inverse, 10).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.function.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(out[1].depth, 2);
    }

    #[test]
    fn unknown_start_is_an_error() {
        let g = diamond();
        assert!(matches!(
            reachable(&g, "zz", TraversalDirection::Forward, 3),
            Err(QueryError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn neighborhood_lists_both_sides() {
        let g = diamond();
        let n = neighborhood(&g, "c").unwrap();
        let callers: Vec<&str> = n.callers.iter().map(|e| e.function.id.as_str()).collect();
        assert_eq!(callers, vec!["a", "b"]);
        assert_eq!(n.callees.len(), 1);
        assert_eq!(n.callees[0].edge.call_site_line, 3);
    }

    #[test]
    fn search_ranks_exact_before_prefix() {
        let mut exact = node("x1");
        exact.name = "save".into();
        let mut prefix = node("x2");
        prefix.name = "saveAll".into();
        let mut other = node("x3");
        other.name = "autosave".into();
        assert_eq!(search_rank(&exact, "save"), Some(0));
        assert_eq!(search_rank(&prefix, "save"), Some(1));
        assert_eq!(search_rank(&other, "save"), Some(2));
        assert_eq!(search_rank(&other, "load"), None);
    }
}
