/*!

Bluntification of overlap graphs: every overlap-annotated edge pinches
the equal-length end regions of its two nodes into one shared block,
splitting the nodes around the overlap and merging the overlapping
pieces, until no overlap annotations remain.

Overlaps are processed longest first, so an end carrying several
stacked overlaps is pinched from the outside in.

*/

use std::cmp::Reverse;

use crate::{
    error::{GraphError, Result},
    handle::{Direction, Edge, Handle},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
    pathgraph::{PathHandleGraph, PathId},
};

#[allow(unused_imports)]
use log::{debug, info};

fn pinch_overlap(graph: &mut HashGraph, edge: Edge, olap: usize) -> Result<()> {
    let Edge(l, r) = edge;

    if l.id() == r.id() {
        return Err(GraphError::unsupported(format!(
            "self-overlap on node {} cannot be bluntified",
            l.id()
        )));
    }

    let a_len = graph.length(l);
    let b_len = graph.length(r);
    if olap > a_len.min(b_len) {
        return Err(GraphError::invariant(format!(
            "overlap {} longer than nodes {} and {}",
            olap,
            l.id(),
            r.id()
        )));
    }

    let a_seq = graph.sequence(l);
    let b_seq = graph.sequence(r);
    if a_seq[a_len - olap..] != b_seq[..olap] {
        return Err(GraphError::invalid(format!(
            "overlap sequences disagree between {} and {}",
            l, r
        )));
    }

    graph.remove_edge(edge);

    let a_tail = if olap < a_len {
        graph.split_handle(l, a_len - olap)?.1
    } else {
        l
    };
    let b_head = if olap < b_len {
        graph.split_handle(r, olap)?.0
    } else {
        r
    };

    // the two overlap pieces spell the same bases; fold the right one
    // into the left and rewire its remaining attachments
    let map = |h: Handle| {
        if h == b_head {
            a_tail
        } else if h == b_head.flip() {
            a_tail.flip()
        } else {
            h
        }
    };

    let lefts: Vec<(Handle, usize)> = graph
        .neighbors(b_head, Direction::Left)
        .map(|x| (x, graph.edge_overlap(Edge(x, b_head))))
        .collect();
    for (x, ov) in lefts {
        graph.create_edge_with_overlap(Edge(map(x), a_tail), ov)?;
    }

    let rights: Vec<(Handle, usize)> = graph
        .neighbors(b_head, Direction::Right)
        .map(|y| (y, graph.edge_overlap(Edge(b_head, y))))
        .collect();
    for (y, ov) in rights {
        graph.create_edge_with_overlap(Edge(a_tail, map(y)), ov)?;
    }

    let occs: Vec<(PathId, usize)> = graph.occurrences(b_head).collect();
    for (path_id, ix) in occs {
        let mh = graph.paths[&path_id].mappings[ix].pos.handle;
        let nh = if mh == b_head { a_tail } else { a_tail.flip() };
        graph.swap_mapping_node(path_id, ix, nh)?;
    }

    graph.remove_handle(b_head);
    Ok(())
}

/// Pinch every overlap edge until the graph is blunt. Fails on
/// mismatched overlap sequences and on self-overlaps; the graph is
/// left partially bluntified in that case.
pub fn bluntify(graph: &mut HashGraph) -> Result<()> {
    let mut pinched = 0usize;

    loop {
        let next = graph
            .edge_overlaps
            .iter()
            .filter(|(_, &o)| o > 0)
            .max_by_key(|&(e, &o)| (o, Reverse(*e)))
            .map(|(e, o)| (*e, *o));

        match next {
            None => break,
            Some((edge, olap)) => {
                pinch_overlap(graph, edge, olap)?;
                pinched += 1;
            }
        }
    }

    debug!("bluntify: pinched {} overlaps", pinched);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_overlap_pinches_to_shared_block() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGTT");
        let h2 = graph.append_handle(b"TTGGA");
        graph
            .create_edge_with_overlap(Edge(h1, h2), 2)
            .unwrap();

        bluntify(&mut graph).unwrap();

        assert!(graph.edge_overlaps.is_empty());
        assert_eq!(graph.node_count(), 3);

        // walking the chain spells the merged sequence once
        let mut h = h1;
        let mut spelled = graph.sequence(h);
        while let Some(next) =
            graph.neighbors(h, Direction::Right).next()
        {
            spelled.extend(graph.sequence(next));
            h = next;
        }
        assert_eq!(spelled, b"ACGTTGGA".to_vec());
    }

    #[test]
    fn full_node_overlap_merges_nodes() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AT");
        let h2 = graph.append_handle(b"AT");
        let h3 = graph.append_handle(b"CC");
        graph.create_edge_with_overlap(Edge(h1, h2), 2).unwrap();
        graph.create_edge(Edge(h2, h3)).unwrap();

        bluntify(&mut graph).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert!(graph.has_node(h1.id()));
        assert!(!graph.has_node(h2.id()));
        assert!(graph.has_edge(h1, h3));
    }

    #[test]
    fn mismatched_overlap_is_an_error() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGTT");
        let h2 = graph.append_handle(b"GAGGA");
        graph.create_edge_with_overlap(Edge(h1, h2), 2).unwrap();

        assert!(bluntify(&mut graph).is_err());
    }
}
