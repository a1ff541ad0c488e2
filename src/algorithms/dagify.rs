/*!

DAGification: copy acyclic regions through unchanged, and unroll every
strongly-connected or self-looping component into a bounded stack of
copies so that no directed cycle survives.

*/

use std::collections::BTreeSet;

use fnv::FnvHashMap;

use crate::{
    error::Result,
    handle::{Direction, Edge, Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
};

use super::scc::strong_components_handles;
use super::NodeTranslation;

#[allow(unused_imports)]
use log::{debug, info};

/// Unroll the graph into a DAG.
///
/// Each cyclic component is materialized as up to `expand_steps`
/// copies, every in-component edge forwarding from one copy to the
/// next. Copying stops early once the shortest return walk through
/// the copies reaches `min_walk_length` bases or the copied component
/// grows past `component_max` nodes.
///
/// Returns the new graph and a translation from new node ids to
/// `(original id, reversed)` pairs; paths are not carried over.
pub fn dagify(
    graph: &HashGraph,
    expand_steps: usize,
    min_walk_length: usize,
    component_max: usize,
) -> Result<(HashGraph, NodeTranslation)> {
    let expand_steps = std::cmp::max(expand_steps, 1);

    // collect the components that need unrolling
    let mut group_of: FnvHashMap<NodeId, usize> = FnvHashMap::default();
    let mut groups: Vec<BTreeSet<NodeId>> = Vec::new();

    for comp in strong_components_handles(graph) {
        let ids: BTreeSet<NodeId> = comp.iter().map(|h| h.id()).collect();
        if ids.iter().any(|id| group_of.contains_key(id)) {
            // the mirror image of a component we already took
            continue;
        }

        let cyclic = comp.len() > 1
            || comp.iter().any(|&h| {
                graph.neighbors(h, Direction::Right).any(|n| n == h)
            });

        if cyclic {
            for id in ids.iter() {
                group_of.insert(*id, groups.len());
            }
            groups.push(ids);
        }
    }

    // a side-to-side self edge makes its node loop through its own
    // reverse strand; it unrolls like a one-node component
    for edge in graph.edges_iter() {
        if edge.is_inverting_self_edge()
            && !group_of.contains_key(&edge.0.id())
        {
            let id = edge.0.id();
            let mut ids = BTreeSet::new();
            ids.insert(id);
            group_of.insert(id, groups.len());
            groups.push(ids);
        }
    }

    debug!("dagify: unrolling {} cyclic components", groups.len());

    // per-group copy counts
    let copies_of: Vec<usize> = groups
        .iter()
        .map(|group| {
            let size = group.len();
            let min_len = group
                .iter()
                .map(|id| {
                    graph.sequence_slice(Handle::pack(*id, false)).len()
                })
                .min()
                .unwrap_or(1)
                .max(1);
            let mut copies = 1usize;
            while copies < expand_steps
                && copies * min_len < min_walk_length
                && (copies + 1) * size <= component_max
            {
                copies += 1;
            }
            copies
        })
        .collect();

    let mut out = HashGraph::new();
    let mut translation: NodeTranslation = FnvHashMap::default();

    // originals keep their ids and serve as copy zero
    let mut ids: Vec<NodeId> = graph.handles_iter().map(|h| h.id()).collect();
    ids.sort();
    for id in ids.iter() {
        let h = Handle::pack(*id, false);
        out.create_handle(graph.sequence_slice(h), *id)?;
        translation.insert(*id, (*id, false));
    }

    // later copies of unrolled components get fresh ids
    let mut copy_ids: FnvHashMap<(usize, usize, NodeId), NodeId> =
        FnvHashMap::default();
    let mut next_id = graph.max_node_id() + 1;
    for (gix, group) in groups.iter().enumerate() {
        for c in 1..copies_of[gix] {
            for id in group.iter() {
                let h = Handle::pack(*id, false);
                out.create_handle(graph.sequence_slice(h), next_id)?;
                copy_ids.insert((gix, c, *id), next_id);
                translation.insert(next_id, (*id, false));
                next_id = next_id + 1;
            }
        }
    }

    let copy_handle = |h: Handle, gix: usize, c: usize| -> Handle {
        if c == 0 {
            h
        } else {
            Handle::pack(copy_ids[&(gix, c, h.id())], h.is_reverse())
        }
    };

    for Edge(l, r) in graph.edges_iter() {
        let lg = group_of.get(&l.id()).copied();
        let rg = group_of.get(&r.id()).copied();

        match (lg, rg) {
            (Some(g1), Some(g2)) if g1 == g2 => {
                // in-component edges forward to the next copy
                for c in 0..copies_of[g1].saturating_sub(1) {
                    out.create_edge(Edge(
                        copy_handle(l, g1, c),
                        copy_handle(r, g1, c + 1),
                    ))?;
                }
            }
            _ => {
                // edges leave every copy of their source component
                // and enter copy zero of their target component
                let source_copies = match lg {
                    Some(g) => copies_of[g],
                    None => 1,
                };
                for c in 0..source_copies {
                    let lh = match lg {
                        Some(g) => copy_handle(l, g, c),
                        None => l,
                    };
                    out.create_edge(Edge(lh, r))?;
                }
            }
        }
    }

    Ok((out, translation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::is_cyclic;
    use crate::mutablehandlegraph::*;

    #[test]
    fn acyclic_graph_copies_through() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AC");
        let h2 = graph.append_handle(b"GT");
        graph.create_edge(Edge(h1, h2)).unwrap();

        let (dag, trans) = dagify(&graph, 3, 10, 100).unwrap();
        assert_eq!(dag.node_count(), 2);
        assert_eq!(dag.edge_count(), 1);
        assert_eq!(trans[&NodeId(1)], (NodeId(1), false));
    }

    #[test]
    fn two_node_cycle_unrolls() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"A");
        let h2 = graph.append_handle(b"C");
        graph.create_edge(Edge(h1, h2)).unwrap();
        graph.create_edge(Edge(h2, h1)).unwrap();

        let (dag, trans) = dagify(&graph, 3, 3, 100).unwrap();
        assert!(!is_cyclic(&dag));
        // three copies of the two-node component
        assert_eq!(dag.node_count(), 6);
        // every copy translates back to an original node
        for h in dag.handles_iter() {
            let (orig, rev) = trans[&h.id()];
            assert!(!rev);
            assert!(orig == NodeId(1) || orig == NodeId(2));
        }
    }

    #[test]
    fn self_loop_unrolls() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGT");
        graph.create_edge(Edge(h1, h1)).unwrap();

        let (dag, _) = dagify(&graph, 4, 8, 100).unwrap();
        assert!(!is_cyclic(&dag));
        // 8 bases of walk need two copies of the 4-base node
        assert_eq!(dag.node_count(), 2);
    }

    #[test]
    fn inverting_self_edge_counts_as_looping() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AAAA");
        graph.create_edge(Edge(h1, h1.flip())).unwrap();

        let (dag, _) = dagify(&graph, 2, 1, 100).unwrap();
        assert!(!is_cyclic(&dag));
    }
}
