use fnv::FnvHashSet;

use crate::{
    error::{GraphError, Result},
    handle::{Direction, Edge},
    handlegraph::*,
    hashgraph::HashGraph,
    pathgraph::PathHandleGraph,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace};

/// Check the structural invariants of a graph: adjacency symmetry,
/// canonical edge uniqueness, path rank density, and mapping/node
/// consistency. Returns the first violation found.
pub fn validate(graph: &HashGraph) -> Result<()> {
    info!("validating graph");

    // all neighbors of all nodes exist, and each adjacency has its
    // reciprocal entry
    for handle in graph.handles_iter() {
        for dir in [Direction::Left, Direction::Right].iter() {
            for neighbor in graph.neighbors(handle, *dir) {
                if !graph.has_node(neighbor.id()) {
                    return Err(GraphError::invariant(format!(
                        "node {} has a neighbor {} that does not exist",
                        handle.id(),
                        neighbor.id()
                    )));
                }
                let (from, to) = match dir {
                    Direction::Right => (handle, neighbor),
                    Direction::Left => (neighbor, handle),
                };
                if !graph
                    .neighbors(from, Direction::Right)
                    .any(|h| h == to)
                    || !graph
                        .neighbors(to, Direction::Left)
                        .any(|h| h == from)
                {
                    return Err(GraphError::invariant(format!(
                        "edge between {} and {} lacks its reciprocal entry",
                        from, to
                    )));
                }
            }
        }
    }

    // exactly one canonical record per edge
    let mut seen_edges: FnvHashSet<Edge> = FnvHashSet::default();
    let mut edge_total = 0usize;
    for edge in graph.edges_iter() {
        edge_total += 1;
        if !seen_edges.insert(edge) {
            return Err(GraphError::invariant(format!(
                "edge between {} and {} appears twice",
                edge.0, edge.1
            )));
        }
    }
    if edge_total != graph.edge_count() {
        return Err(GraphError::invariant(format!(
            "edge count {} disagrees with enumeration {}",
            graph.edge_count(),
            edge_total
        )));
    }

    // overlaps stay within their nodes
    for (edge, &overlap) in graph.edge_overlaps.iter() {
        let max = graph
            .length(edge.0)
            .min(graph.length(edge.1));
        if overlap > max {
            return Err(GraphError::invariant(format!(
                "overlap {} exceeds the nodes of {} -- {}",
                overlap, edge.0, edge.1
            )));
        }
    }

    // paths: mappings on live nodes, ranks strictly increasing,
    // occurrences in sync
    for path_id in graph.path_ids_iter() {
        let mut prev_rank = 0usize;
        for (ix, mapping) in graph.mappings_iter(path_id).enumerate() {
            let id = mapping.pos.id();
            if !graph.has_node(id) {
                return Err(GraphError::invariant(format!(
                    "path {} mapping {} references missing node {}",
                    path_id, ix, id
                )));
            }
            if mapping.rank <= prev_rank {
                return Err(GraphError::invariant(format!(
                    "path {} rank {} does not increase at mapping {}",
                    path_id, mapping.rank, ix
                )));
            }
            prev_rank = mapping.rank;

            let node = graph.get_node_unchecked(&id);
            let indexed = node
                .occurrences
                .get(&path_id)
                .map(|v| v.contains(&ix))
                .unwrap_or(false);
            if !indexed {
                return Err(GraphError::invariant(format!(
                    "path {} mapping {} is not indexed on node {}",
                    path_id, ix, id
                )));
            }

            let len = graph.length(mapping.pos.handle);
            if mapping.pos.offset + mapping.from_len() > len {
                return Err(GraphError::invariant(format!(
                    "path {} mapping {} overruns node {}",
                    path_id, ix, id
                )));
            }
        }
    }

    // occurrences point at real mappings
    for handle in graph.handles_iter() {
        let node = graph.get_node_unchecked(&handle.id());
        for (path_id, indices) in node.occurrences.iter() {
            for &ix in indices {
                let on_node = graph
                    .get_path(path_id)
                    .and_then(|p| p.mappings.get(ix))
                    .map(|m| m.pos.id() == handle.id())
                    .unwrap_or(false);
                if !on_node {
                    return Err(GraphError::invariant(format!(
                        "node {} occurrence ({}, {}) is stale",
                        handle.id(),
                        path_id,
                        ix
                    )));
                }
            }
        }
    }

    info!("graph successfully validated");
    Ok(())
}
