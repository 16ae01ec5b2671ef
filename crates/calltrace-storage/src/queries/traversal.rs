//! Recursive CTE traversal over call_edges, used when the graph is too
//! large to walk in memory.

use std::collections::HashMap;

use calltrace_core::errors::StorageError;
use calltrace_core::traits::{CallEdgeRecord, TraversalDirection, TraversalRow};
use rusqlite::{params, Connection};

use super::call_edges::get_edges_by_callee;

/// Functions reachable from `start` within `max_depth` hops, each at its
/// shortest depth, ordered by (depth, id). `UNION` keeps the working set to
/// one row per (function, depth), so cycles terminate at the depth bound.
pub fn traverse(
    conn: &Connection,
    start: &str,
    direction: TraversalDirection,
    max_depth: u32,
) -> Result<Vec<TraversalRow>, StorageError> {
    let sql = match direction {
        TraversalDirection::Forward => {
            "WITH RECURSIVE reachable(id, depth) AS (
                SELECT ?1, 0
                UNION
                SELECT ce.callee_id, r.depth + 1
                FROM call_edges ce
                JOIN reachable r ON ce.caller_id = r.id
                WHERE r.depth < ?2
            )
            SELECT id, MIN(depth) AS d FROM reachable
            WHERE id != ?1 GROUP BY id ORDER BY d, id"
        }
        TraversalDirection::Inverse => {
            "WITH RECURSIVE callers(id, depth) AS (
                SELECT ?1, 0
                UNION
                SELECT ce.caller_id, c.depth + 1
                FROM call_edges ce
                JOIN callers c ON ce.callee_id = c.id
                WHERE c.depth < ?2
            )
            SELECT id, MIN(depth) AS d FROM callers
            WHERE id != ?1 GROUP BY id ORDER BY d, id"
        }
    };

    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![start, max_depth], |row| {
        Ok(TraversalRow {
            function_id: row.get(0)?,
            depth: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
}

/// Edges of one shortest forward path from `from` to `to`.
///
/// Depths come from one forward traversal; the path is then walked back
/// from `to`, at each step taking the most confident edge from a function
/// one level closer to `from` (ties: lowest line, then caller id).
pub fn shortest_path(
    conn: &Connection,
    from: &str,
    to: &str,
    max_depth: u32,
) -> Result<Option<Vec<CallEdgeRecord>>, StorageError> {
    if from == to {
        return Ok(Some(Vec::new()));
    }
    let mut depths: HashMap<String, u32> = traverse(conn, from, TraversalDirection::Forward, max_depth)?
        .into_iter()
        .map(|row| (row.function_id, row.depth))
        .collect();
    if !depths.contains_key(to) {
        return Ok(None);
    }
    depths.insert(from.to_string(), 0);

    let mut path = Vec::new();
    let mut current = to.to_string();
    while current != from {
        let Some(&depth) = depths.get(&current) else {
            return Ok(None);
        };
        let best = get_edges_by_callee(conn, &current)?
            .into_iter()
            .filter(|e| depths.get(&e.caller_id) == Some(&(depth - 1)))
            .min_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then(a.call_site_line.cmp(&b.call_site_line))
                    .then_with(|| a.caller_id.cmp(&b.caller_id))
            });
        let Some(edge) = best else {
            return Ok(None);
        };
        current = edge.caller_id.clone();
        path.push(edge);
    }
    path.reverse();
    Ok(Some(path))
}
