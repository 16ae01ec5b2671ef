//! Shortest call path by breadth-first search with parent pointers.

use std::collections::VecDeque;

use calltrace_core::errors::QueryError;
use calltrace_core::types::collections::FxHashMap;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::call_graph::types::{CallEdge, CallGraph, EdgeView};

use super::CallPath;

/// One shortest path (fewest hops) from `from` to `to` within `max_depth`
/// hops. Between two functions joined by several edges the most confident
/// one is used, then the lowest call-site line.
pub fn find_path(
    graph: &CallGraph,
    from: &str,
    to: &str,
    max_depth: u32,
) -> Result<Option<CallPath>, QueryError> {
    let start = graph
        .get_node(from)
        .ok_or_else(|| QueryError::UnknownFunction { id: from.to_string() })?;
    let target = graph
        .get_node(to)
        .ok_or_else(|| QueryError::UnknownFunction { id: to.to_string() })?;
    if start == target {
        return Ok(Some(CallPath::trivial(from)));
    }

    let mut parent: FxHashMap<NodeIndex, (NodeIndex, CallEdge)> = FxHashMap::default();
    let mut queue = VecDeque::new();
    queue.push_back((start, 0u32));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for (next, edge) in best_edges(graph, node) {
            if next == start || parent.contains_key(&next) {
                continue;
            }
            parent.insert(next, (node, edge));
            if next == target {
                return Ok(reconstruct(graph, &parent, start, target));
            }
            queue.push_back((next, depth + 1));
        }
    }
    Ok(None)
}

/// Outgoing neighbors with the preferred edge to each, in id order.
fn best_edges(graph: &CallGraph, node: NodeIndex) -> Vec<(NodeIndex, CallEdge)> {
    let mut best: FxHashMap<NodeIndex, CallEdge> = FxHashMap::default();
    for e in graph.graph.edges_directed(node, Direction::Outgoing) {
        let candidate = *e.weight();
        best.entry(e.target())
            .and_modify(|current| {
                let better = candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence
                        && candidate.call_site_line < current.call_site_line);
                if better {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    let mut out: Vec<(NodeIndex, CallEdge)> = best.into_iter().collect();
    out.sort_by(|a, b| {
        let ida = graph.node_weight(a.0).map(|n| n.id.as_str());
        let idb = graph.node_weight(b.0).map(|n| n.id.as_str());
        ida.cmp(&idb)
    });
    out
}

fn reconstruct(
    graph: &CallGraph,
    parent: &FxHashMap<NodeIndex, (NodeIndex, CallEdge)>,
    start: NodeIndex,
    target: NodeIndex,
) -> Option<CallPath> {
    let mut edges = Vec::new();
    let mut current = target;
    while current != start {
        let (prev, edge) = parent.get(&current)?;
        let caller = graph.node_weight(*prev)?;
        let callee = graph.node_weight(current)?;
        edges.push(EdgeView {
            caller: caller.id.clone(),
            callee: callee.id.clone(),
            call_site_line: edge.call_site_line,
            resolution: edge.resolution,
            confidence: edge.confidence,
        });
        current = *prev;
    }
    edges.reverse();
    CallPath::from_edges(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::types::{FunctionNode, Resolution};
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

    fn edge(resolution: Resolution, confidence: f32, line: u32) -> CallEdge {
        CallEdge {
            resolution,
            confidence,
            call_site_line: line,
        }
    }

    fn graph() -> CallGraph {
        let mut g = CallGraph::new();
        for id in ["a", "b", "c", "d"] {
            g.add_function(node(id));
        }
        g.add_edge("a", "b", edge(Resolution::SameFile, 0.95, 1));
        g.add_edge("b", "d", edge(Resolution::ImportBased, 0.75, 2));
        g.add_edge("a", "c", edge(Resolution::Fuzzy, 0.40, 3));
        g.add_edge("c", "d", edge(Resolution::SameFile, 0.95, 4));
        g
    }

    #[test]
    fn reports_product_and_weakest_link() {
        let g = graph();
        let path = find_path(&g, "a", "d", 10).unwrap().unwrap();
        assert_eq!(path.functions, vec!["a", "b", "d"]);
        assert!((path.confidence - 0.95 * 0.75).abs() < 1e-6);
        assert_eq!(path.weakest_link.unwrap().resolution, Resolution::ImportBased);
    }

    #[test]
    fn depth_limit_hides_far_targets() {
        let g = graph();
        assert_eq!(find_path(&g, "a", "d", 1).unwrap(), None);
    }

    #[test]
    fn unreachable_is_none() {
        let g = graph();
        assert_eq!(find_path(&g, "d", "a", 10).unwrap(), None);
    }

    #[test]
    fn same_node_is_trivial() {
        let g = graph();
        let path = find_path(&g, "b", "b", 10).unwrap().unwrap();
        assert!(path.is_empty());
        assert_eq!(path.confidence, 1.0);
    }

    #[test]
    fn parallel_edges_prefer_confidence() {
        let mut g = CallGraph::new();
        g.add_function(node("a"));
        g.add_function(node("b"));
        g.add_edge("a", "b", edge(Resolution::Fuzzy, 0.40, 1));
        g.add_edge("a", "b", edge(Resolution::SameFile, 0.95, 9));
        let path = find_path(&g, "a", "b", 3).unwrap().unwrap();
        assert_eq!(path.edges[0].call_site_line, 9);
    }
}
