/*!

Topological sorting of bidirected graphs: Kahn's algorithm over
oriented handles, with cycle detection by remaining in-degree.

*/

use std::collections::VecDeque;

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    error::Result,
    handle::{Direction, Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::TransformNodeIds,
};

#[allow(unused_imports)]
use log::{debug, info};

/// Compute an order over the nodes, one oriented handle per node,
/// such that in an acyclic graph every edge leads from an earlier to
/// a later handle. Returns the order and whether the graph is cyclic.
///
/// A self edge on a node, inverting or not, makes the graph cyclic.
/// All other cycles surface as a moment where no unvisited node has a
/// zero in-degree orientation; the sort then breaks the cycle at the
/// smallest unvisited id and reports cyclicity.
pub fn topological_order(graph: &HashGraph) -> (Vec<Handle>, bool) {
    let node_count = graph.node_count();

    let mut cyclic = graph.edges_iter().any(|e| e.is_self_edge());

    let mut indegree: FnvHashMap<Handle, usize> =
        FnvHashMap::with_capacity_and_hasher(
            node_count * 2,
            Default::default(),
        );
    for fwd in graph.handles_iter() {
        for h in [fwd, fwd.flip()].iter() {
            indegree.insert(*h, graph.degree(*h, Direction::Left));
        }
    }

    // heads: forward handles with nothing to their left. A sink's
    // reverse orientation also has in-degree zero but must not seed,
    // or it would be emitted before the walk reaches it.
    let mut seeds: Vec<Handle> = indegree
        .iter()
        .filter(|(h, &d)| d == 0 && !h.is_reverse())
        .map(|(h, _)| *h)
        .collect();
    seeds.sort();

    let mut queue: VecDeque<Handle> = seeds.into_iter().collect();
    let mut unvisited: std::collections::BTreeSet<NodeId> =
        graph.handles_iter().map(|h| h.id()).collect();
    let mut emitted: FnvHashSet<NodeId> = FnvHashSet::default();
    let mut order: Vec<Handle> = Vec::with_capacity(node_count);

    while order.len() < node_count {
        let next = loop {
            match queue.pop_front() {
                Some(h) if emitted.contains(&h.id()) => continue,
                Some(h) => break h,
                None => {
                    // a component may only be enterable through a
                    // reverse orientation; failing that, the
                    // remaining nodes all sit on cycles
                    let mut candidate = None;
                    for &id in unvisited.iter() {
                        let fwd = Handle::pack(id, false);
                        if indegree[&fwd] == 0 {
                            candidate = Some(fwd);
                            break;
                        }
                        if candidate.is_none() && indegree[&fwd.flip()] == 0 {
                            candidate = Some(fwd.flip());
                        }
                    }
                    match candidate {
                        Some(h) => break h,
                        None => {
                            cyclic = true;
                            let id = *unvisited.iter().next().unwrap();
                            break Handle::pack(id, false);
                        }
                    }
                }
            }
        };

        emitted.insert(next.id());
        unvisited.remove(&next.id());
        order.push(next);

        for neighbor in graph.neighbors(next, Direction::Right) {
            if emitted.contains(&neighbor.id()) {
                continue;
            }
            let d = indegree.get_mut(&neighbor).unwrap();
            if *d > 0 {
                *d -= 1;
            }
            if *d == 0 {
                queue.push_back(neighbor);
            }
        }
    }

    (order, cyclic)
}

/// True if the graph admits no topological order.
pub fn is_cyclic(graph: &HashGraph) -> bool {
    topological_order(graph).1
}

/// Sort the graph: compute a topological order, reorient any handles
/// the order visits in reverse, and renumber node ids to match the
/// order. Returns whether the graph was cyclic (in which case the
/// order is a best effort with cycles broken arbitrarily).
pub fn topological_sort(graph: &mut HashGraph) -> Result<bool> {
    let (order, cyclic) = topological_order(graph);
    debug!("applying topological order over {} nodes", order.len());
    graph.apply_ordering(&order)?;
    Ok(cyclic)
}
