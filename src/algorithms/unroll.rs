/*!

Unfolding inversions: duplicate the reverse strand that is reachable
through reversing edges, up to a base-length bound, so that every
inverted walk of bounded length can be read without switching strand.

*/

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    error::Result,
    handle::{Direction, Edge, Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
};

use super::NodeTranslation;

#[allow(unused_imports)]
use log::{debug, info};

/// Induce an orientation on every node by search: a node's induced
/// forward strand is the strand on which the search first reads it.
/// Returns, per node, whether the induced forward is the stored
/// reverse.
fn induce_orientations(graph: &HashGraph) -> FnvHashMap<NodeId, bool> {
    let mut orient: FnvHashMap<NodeId, bool> = FnvHashMap::default();

    let mut ids: Vec<NodeId> = graph.handles_iter().map(|h| h.id()).collect();
    ids.sort();

    for id in ids {
        if orient.contains_key(&id) {
            continue;
        }
        orient.insert(id, false);
        let mut stack = vec![Handle::pack(id, false)];

        while let Some(h) = stack.pop() {
            let next: Vec<Handle> = graph
                .neighbors(h, Direction::Right)
                .chain(graph.neighbors(h, Direction::Left))
                .collect();
            for n in next {
                if !orient.contains_key(&n.id()) {
                    orient.insert(n.id(), n.is_reverse());
                    stack.push(n);
                }
            }
        }
    }

    orient
}

/// Duplicate the reverse strand reachable through reversing edges,
/// walking at most `max_length` bases past each inversion. The
/// original forward strand is preserved; reversing edges are rewired
/// through the duplicated nodes.
///
/// Returns the new graph and a translation from new node ids to
/// `(original id, reads the reverse strand)`. Embedded paths are not
/// carried over.
pub fn unfold(
    graph: &HashGraph,
    max_length: usize,
) -> Result<(HashGraph, NodeTranslation)> {
    let orient = induce_orientations(graph);
    let backward =
        |h: Handle| -> bool { h.is_reverse() != orient[&h.id()] };

    // every directed arc once
    let mut arcs: FnvHashSet<(Handle, Handle)> = FnvHashSet::default();
    for Edge(l, r) in graph.edges_iter() {
        arcs.insert((l, r));
        arcs.insert((r.flip(), l.flip()));
    }
    let mut arcs: Vec<(Handle, Handle)> = arcs.into_iter().collect();
    arcs.sort();

    let mut arcs_from: FnvHashMap<Handle, Vec<Handle>> = FnvHashMap::default();
    for &(x, y) in arcs.iter() {
        arcs_from.entry(x).or_default().push(y);
    }

    // shortest base distance to each reverse-strand handle, entered
    // through a reversing edge
    let mut dist: FnvHashMap<Handle, usize> = FnvHashMap::default();
    let mut heap: BinaryHeap<Reverse<(usize, u64)>> = BinaryHeap::new();

    for &(x, y) in arcs.iter() {
        if !backward(x) && backward(y) {
            let d = graph.length(y);
            if d <= max_length
                && dist.get(&y).map(|&old| d < old).unwrap_or(true)
            {
                dist.insert(y, d);
                heap.push(Reverse((d, y.0)));
            }
        }
    }

    while let Some(Reverse((d, packed))) = heap.pop() {
        let h = Handle::from_integer(packed);
        if dist.get(&h) != Some(&d) {
            continue;
        }
        if let Some(nexts) = arcs_from.get(&h) {
            for &y in nexts {
                if !backward(y) {
                    continue;
                }
                let nd = d + graph.length(y);
                if nd <= max_length
                    && dist.get(&y).map(|&old| nd < old).unwrap_or(true)
                {
                    dist.insert(y, nd);
                    heap.push(Reverse((nd, y.0)));
                }
            }
        }
    }

    debug!(
        "unfold: duplicating {} reverse-strand traversals",
        dist.len()
    );

    let mut out = HashGraph::new();
    let mut translation: NodeTranslation = FnvHashMap::default();

    let mut ids: Vec<NodeId> = graph.handles_iter().map(|h| h.id()).collect();
    ids.sort();
    for id in ids {
        let h = Handle::pack(id, false);
        out.create_handle(graph.sequence_slice(h), id)?;
        translation.insert(id, (id, false));
    }

    let mut reverse_copies: Vec<Handle> = dist.keys().copied().collect();
    reverse_copies.sort();

    let mut copy_of: FnvHashMap<Handle, Handle> = FnvHashMap::default();
    let mut next_id = graph.max_node_id() + 1;
    for h in reverse_copies {
        let copy = out.create_handle(&graph.sequence(h), next_id)?;
        copy_of.insert(h, copy);
        translation.insert(next_id, (h.id(), h.is_reverse()));
        next_id = next_id + 1;
    }

    for (x, y) in arcs {
        match (backward(x), backward(y)) {
            (false, false) => {
                out.create_edge(Edge(x, y))?;
            }
            (false, true) => {
                if let Some(&copy) = copy_of.get(&y) {
                    out.create_edge(Edge(x, copy))?;
                }
            }
            (true, false) => {
                if let Some(&copy) = copy_of.get(&x) {
                    out.create_edge(Edge(copy, y))?;
                }
            }
            (true, true) => {
                if let (Some(&cx), Some(&cy)) =
                    (copy_of.get(&x), copy_of.get(&y))
                {
                    out.create_edge(Edge(cx, cy))?;
                }
            }
        }
    }

    Ok((out, translation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inversion_graph() -> HashGraph {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACG");
        let h2 = graph.append_handle(b"TT");
        graph.create_edge(Edge(h1, h2)).unwrap();
        graph.create_edge(Edge(h2, h2.flip())).unwrap();
        graph
    }

    #[test]
    fn forward_graph_is_untouched() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACG");
        let h2 = graph.append_handle(b"TT");
        graph.create_edge(Edge(h1, h2)).unwrap();

        let (unfolded, trans) = unfold(&graph, 100).unwrap();
        assert_eq!(unfolded.node_count(), 2);
        assert_eq!(unfolded.edge_count(), 1);
        assert_eq!(trans.len(), 2);
    }

    #[test]
    fn inverted_walk_becomes_forward() {
        let graph = inversion_graph();

        let (unfolded, trans) = unfold(&graph, 100).unwrap();

        // both reverse traversals get copies, in handle order
        assert_eq!(unfolded.node_count(), 4);
        assert_eq!(trans[&NodeId(3)], (NodeId(1), true));
        assert_eq!(trans[&NodeId(4)], (NodeId(2), true));

        // the walk 1+ 2+ 2- 1- reads forward as 1+ 2+ 4+ 3+
        let walk = [1u64, 2, 4, 3];
        let spelled: Vec<u8> = walk
            .iter()
            .flat_map(|&id| unfolded.sequence(Handle::pack(id, false)))
            .collect();

        let original: Vec<u8> = [
            Handle::pack(1u64, false),
            Handle::pack(2u64, false),
            Handle::pack(2u64, true),
            Handle::pack(1u64, true),
        ]
        .iter()
        .flat_map(|&h| graph.sequence(h))
        .collect();

        assert_eq!(spelled, original);

        for w in walk.windows(2) {
            assert!(unfolded.has_edge(
                Handle::pack(w[0], false),
                Handle::pack(w[1], false)
            ));
        }
    }

    #[test]
    fn max_length_bounds_the_duplication() {
        let graph = inversion_graph();

        let (unfolded, trans) = unfold(&graph, 2).unwrap();

        // only the two-base node fits under the bound
        assert_eq!(unfolded.node_count(), 3);
        assert_eq!(trans[&NodeId(3)], (NodeId(2), true));
        assert!(unfolded.has_edge(
            Handle::pack(2u64, false),
            Handle::pack(3u64, false)
        ));
    }
}
