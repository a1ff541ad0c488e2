/*!

Normalization: repeatedly merge simple components and fold sibling
nodes that share a common prefix, until the total sequence length
stops shrinking or an iteration bound is hit.

Edges are held in canonical orientation by the store itself, so the
doubly-reversed-edge flip of the classic formulation is implicit.

*/

use std::collections::BTreeMap;

use crate::{
    error::Result,
    handle::{Direction, Edge, Handle},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
    pathgraph::{PathHandleGraph, PathId},
};

use super::unchop;

#[allow(unused_imports)]
use log::{debug, info};

fn longest_common_prefix(seqs: &[Vec<u8>]) -> usize {
    let mut p = seqs.iter().map(|s| s.len()).min().unwrap_or(0);
    for seq in seqs.iter().skip(1) {
        let mut k = 0;
        while k < p && seq[k] == seqs[0][k] {
            k += 1;
        }
        p = p.min(k);
    }
    p
}

/// Find one group of sibling handles with identical left-neighbor
/// sets and a shared sequence prefix, split the prefix off and merge
/// it into one node. Returns whether anything was merged.
fn merge_one_sibling_group(graph: &mut HashGraph) -> Result<bool> {
    let mut parents: Vec<Handle> = graph
        .handles_iter()
        .flat_map(|h| vec![h, h.flip()])
        .collect();
    parents.sort();

    for parent in parents {
        let children: Vec<Handle> =
            graph.neighbors(parent, Direction::Right).collect();
        if children.len() < 2 {
            continue;
        }

        let mut groups: BTreeMap<Vec<Handle>, Vec<Handle>> = BTreeMap::new();
        for &c in children.iter() {
            if c.id() == parent.id() {
                continue;
            }
            let mut left_set: Vec<Handle> =
                graph.neighbors(c, Direction::Left).collect();
            left_set.sort();
            left_set.dedup();
            groups.entry(left_set).or_default().push(c);
        }

        for (_, mut members) in groups {
            members.sort();
            members.dedup();
            if members.len() < 2 {
                continue;
            }
            // a node meeting its own flip here means an inversion
            // tangle; leave it alone
            let mut ids: Vec<_> = members.iter().map(|h| h.id()).collect();
            ids.sort();
            ids.dedup();
            if ids.len() != members.len() {
                continue;
            }

            let seqs: Vec<Vec<u8>> =
                members.iter().map(|&c| graph.sequence(c)).collect();
            let p = longest_common_prefix(&seqs);
            if p == 0 {
                continue;
            }

            let mut prefix_handles: Vec<Handle> =
                Vec::with_capacity(members.len());
            for (&c, seq) in members.iter().zip(seqs.iter()) {
                if seq.len() > p {
                    let (head, _tail) = graph.split_handle(c, p)?;
                    prefix_handles.push(head);
                } else {
                    prefix_handles.push(c);
                }
            }

            let keep = prefix_handles[0];
            for &q in prefix_handles[1..].iter() {
                let rights: Vec<Handle> =
                    graph.neighbors(q, Direction::Right).collect();
                for r in rights {
                    let target = if r == q {
                        keep
                    } else if r == q.flip() {
                        keep.flip()
                    } else {
                        r
                    };
                    graph.create_edge(Edge(keep, target))?;
                }

                let occs: Vec<(PathId, usize)> =
                    graph.occurrences(q).collect();
                for (path_id, ix) in occs {
                    let mh = graph.paths[&path_id].mappings[ix].pos.handle;
                    let nh = if mh == q { keep } else { keep.flip() };
                    graph.swap_mapping_node(path_id, ix, nh)?;
                }

                graph.remove_handle(q);
            }

            debug!(
                "merged {} siblings sharing a {}-base prefix",
                members.len(),
                p
            );
            return Ok(true);
        }
    }

    Ok(false)
}

/// Normalize the graph. Returns the number of full iterations run.
pub fn normalize(graph: &mut HashGraph, max_iter: usize) -> Result<usize> {
    let mut iters = 0usize;

    while iters < max_iter {
        let before =
            (graph.node_count(), graph.edge_count(), graph.total_length());

        unchop(graph);
        while merge_one_sibling_group(graph)? {}

        iters += 1;
        let after =
            (graph.node_count(), graph.edge_count(), graph.total_length());
        if after == before {
            break;
        }
    }

    Ok(iters)
}
