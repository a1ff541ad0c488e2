/*!

Distance index construction: resolve every snarl's children, relax
side-to-side distances with Dijkstra over the bounded snarl subgraph,
fill the chain coordinate arrays bottom-up, and serialize the whole
decomposition into the packed record vector.

*/

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    error::{GraphError, Result},
    handle::{Direction, Handle, NodeId},
    handlegraph::HandleGraph,
    snarls::SnarlTree,
};

use super::records::*;

#[allow(unused_imports)]
use log::{debug, info};

/// One child of a snarl, with the concrete boundary traversals of its
/// two sides. `enter_left` is the traversal an outside walk uses to
/// step into the child at its left side; `depart_left` is the
/// traversal a walk leaving the child through that side continues
/// from.
#[derive(Debug, Clone, Copy)]
pub(super) struct SnarlChild {
    pub kind: ChildKind,
    pub enter_left: Handle,
    pub enter_right: Handle,
    pub depart_left: Handle,
    pub depart_right: Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChildKind {
    Chain(usize),
    Node(NodeId),
}

impl SnarlChild {
    pub(super) fn node(id: NodeId) -> SnarlChild {
        let fwd = Handle::pack(id, false);
        SnarlChild {
            kind: ChildKind::Node(id),
            enter_left: fwd,
            enter_right: fwd.flip(),
            depart_left: fwd.flip(),
            depart_right: fwd,
        }
    }

    pub(super) fn chain(ix: usize, start: Handle, end: Handle) -> SnarlChild {
        SnarlChild {
            kind: ChildKind::Chain(ix),
            enter_left: start,
            enter_right: end.flip(),
            depart_left: start.flip(),
            depart_right: end,
        }
    }
}

/// Shortest distances from one departing traversal to every arrival
/// side of a snarl, over the raw graph, never expanding through the
/// boundary nodes.
pub(super) fn snarl_side_dijkstra<G: HandleGraph>(
    graph: &G,
    source: Handle,
    arrivals: &FnvHashMap<Handle, usize>,
    boundary: &FnvHashSet<NodeId>,
    sides: usize,
) -> Vec<Distance> {
    let mut out = vec![Distance::Unreachable; sides];

    let mut dist: FnvHashMap<Handle, u64> = FnvHashMap::default();
    let mut heap: BinaryHeap<Reverse<(u64, u64)>> = BinaryHeap::new();

    dist.insert(source, 0);
    heap.push(Reverse((0, source.0)));

    while let Some(Reverse((d, packed))) = heap.pop() {
        let h = Handle::from_integer(packed);
        if dist.get(&h) != Some(&d) {
            continue;
        }

        for n in graph.handle_edges_iter(h, Direction::Right) {
            if let Some(&side) = arrivals.get(&n) {
                out[side] = out[side].min(Distance::Reachable(d));
            }
            if boundary.contains(&n.id()) {
                continue;
            }
            let nd = d + graph.length(n) as u64;
            if dist.get(&n).map(|&old| nd < old).unwrap_or(true) {
                dist.insert(n, nd);
                heap.push(Reverse((nd, n.0)));
            }
        }
    }

    out
}

/// Longest interior walk from the start bound to the end bound;
/// `Unreachable` stands for an unbounded (cyclic) interior or no
/// walk at all.
fn snarl_interior_max<G: HandleGraph>(
    graph: &G,
    start: Handle,
    end_arrival: Handle,
    boundary: &FnvHashSet<NodeId>,
) -> Distance {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        Gray,
        Done,
    }

    // memo[h] = longest base count from the right side of h to the
    // end arrival; None = no walk
    let mut memo: FnvHashMap<Handle, Option<u64>> = FnvHashMap::default();
    let mut color: FnvHashMap<Handle, Color> = FnvHashMap::default();
    let mut cyclic = false;

    // iterative post-order over the walk digraph
    let mut stack: Vec<(Handle, bool)> = vec![(start, false)];
    while let Some((h, processed)) = stack.pop() {
        if processed {
            let mut best: Option<u64> = None;
            for n in graph.handle_edges_iter(h, Direction::Right) {
                if n == end_arrival {
                    best = Some(best.unwrap_or(0).max(0));
                } else if boundary.contains(&n.id()) {
                    continue;
                } else if let Some(Some(sub)) = memo.get(&n) {
                    let total = sub + graph.length(n) as u64;
                    best = Some(best.unwrap_or(0).max(total));
                }
            }
            memo.insert(h, best);
            color.insert(h, Color::Done);
            continue;
        }

        match color.get(&h) {
            Some(Color::Done) => continue,
            Some(Color::Gray) => continue,
            None => {}
        }
        color.insert(h, Color::Gray);
        stack.push((h, true));

        for n in graph.handle_edges_iter(h, Direction::Right) {
            if n == end_arrival || boundary.contains(&n.id()) {
                continue;
            }
            match color.get(&n) {
                None => stack.push((n, false)),
                Some(Color::Gray) => cyclic = true,
                Some(Color::Done) => {}
            }
        }
    }

    if cyclic {
        return Distance::Unreachable;
    }
    match memo.get(&start) {
        Some(Some(d)) => Distance::Reachable(*d),
        _ => Distance::Unreachable,
    }
}

#[derive(Debug, Clone)]
pub(super) struct TempSnarl {
    pub children: Vec<SnarlChild>,
    pub matrix: Vec<Distance>,
    pub interior_min: Distance,
    pub interior_max: Distance,
    pub loop_start: Distance,
    pub loop_end: Distance,
    pub oversized: bool,
}

#[derive(Debug, Clone)]
struct TempChain {
    prefix_sum: Vec<Distance>,
    forward_loops: Vec<Distance>,
    backward_loops: Vec<Distance>,
    max_prefix: Vec<Distance>,
    min_length: Distance,
    max_length: Distance,
}

/// Resolve the children of one snarl: its child chains from the tree,
/// plus any interior node that is not a chain boundary, discovered by
/// search from the start bound.
pub(super) fn resolve_snarl_children<G: HandleGraph>(
    graph: &G,
    tree: &SnarlTree,
    snarl_ix: usize,
) -> Vec<SnarlChild> {
    let snarl = &tree.snarls[snarl_ix];
    let mut children: Vec<SnarlChild> = snarl
        .children
        .iter()
        .map(|&c| {
            SnarlChild::chain(c, tree.chains[c].start, tree.chains[c].end)
        })
        .collect();

    // the ancestor chain of a boundary node that is a direct child
    // of this snarl, if any
    let child_chain_of = |id: NodeId| -> Option<usize> {
        let (mut chain, _) = tree.chain_of_node(id)?;
        loop {
            match tree.chains[chain].parent_snarl {
                Some(s) if s == snarl_ix => return Some(chain),
                Some(s) => chain = tree.snarls[s].parent_chain,
                None => return None,
            }
        }
    };

    // search outward from both bounds; child chains are crossed, not
    // entered, so everything else reached is a plain node child
    let mut extra: Vec<NodeId> = Vec::new();
    let mut known: FnvHashSet<NodeId> = FnvHashSet::default();
    let mut seen: FnvHashSet<Handle> = FnvHashSet::default();
    let mut stack = vec![snarl.start, snarl.end.flip()];
    while let Some(h) = stack.pop() {
        if !seen.insert(h) {
            continue;
        }
        for n in graph.handle_edges_iter(h, Direction::Right) {
            let id = n.id();
            if id == snarl.start.id() || id == snarl.end.id() {
                continue;
            }
            if let Some(chain) = child_chain_of(id) {
                stack.push(tree.chains[chain].start.flip());
                stack.push(tree.chains[chain].end);
            } else if tree.chain_of_node(id).is_none() {
                if known.insert(id) {
                    extra.push(id);
                }
                stack.push(n);
                stack.push(n.flip());
            }
        }
    }
    extra.sort();
    for id in extra {
        children.push(SnarlChild::node(id));
    }

    children
}

/// Arrival-handle table for a snarl: which traversal lands on which
/// matrix side.
pub(super) fn snarl_arrivals(
    start: Handle,
    end: Handle,
    children: &[SnarlChild],
) -> FnvHashMap<Handle, usize> {
    let mut arrivals: FnvHashMap<Handle, usize> = FnvHashMap::default();
    arrivals.insert(start.flip(), start_bound_side());
    arrivals.insert(end, end_bound_side(children.len()));
    for (ix, child) in children.iter().enumerate() {
        let rank = ix + 1;
        arrivals.insert(child.enter_left, side_left(rank));
        arrivals.insert(child.enter_right, side_right(rank));
    }
    arrivals
}

/// Departing traversal of one matrix side.
pub(super) fn side_departure(
    start: Handle,
    end: Handle,
    children: &[SnarlChild],
    side: usize,
) -> Option<Handle> {
    let c = children.len();
    if side == start_bound_side() {
        Some(start)
    } else if side == end_bound_side(c) {
        Some(end.flip())
    } else {
        let rank = side / 2;
        if rank == 0 || rank > c {
            None
        } else if side % 2 == 0 {
            Some(children[rank - 1].depart_left)
        } else {
            Some(children[rank - 1].depart_right)
        }
    }
}

fn populate_snarl<G: HandleGraph>(
    graph: &G,
    tree: &SnarlTree,
    snarl_ix: usize,
    size_limit: usize,
) -> TempSnarl {
    let snarl = &tree.snarls[snarl_ix];
    let children = resolve_snarl_children(graph, tree, snarl_ix);
    let c = children.len();
    let sides = 2 * (c + 2);
    let oversized = c > size_limit;

    let mut boundary: FnvHashSet<NodeId> = FnvHashSet::default();
    boundary.insert(snarl.start.id());
    boundary.insert(snarl.end.id());

    let arrivals = snarl_arrivals(snarl.start, snarl.end, &children);

    let mut matrix = vec![Distance::Unreachable; triangle_len(sides)];

    // oversized snarls still need their boundary rows for the chain
    // arrays; the full pairwise matrix is what gets skipped
    let source_sides: Vec<usize> = if oversized {
        vec![start_bound_side(), end_bound_side(c)]
    } else {
        (0..sides).collect()
    };

    for &side in source_sides.iter() {
        let source =
            match side_departure(snarl.start, snarl.end, &children, side) {
                Some(h) => h,
                None => continue,
            };
        let row =
            snarl_side_dijkstra(graph, source, &arrivals, &boundary, sides);
        for (other, d) in row.into_iter().enumerate() {
            let ix = triangle_index(sides, side, other);
            matrix[ix] = matrix[ix].min(d);
        }
    }

    let start_side = start_bound_side();
    let end_side = end_bound_side(c);
    let interior_min =
        matrix[triangle_index(sides, start_side, end_side)];
    let loop_start = matrix[triangle_index(sides, start_side, start_side)];
    let loop_end = matrix[triangle_index(sides, end_side, end_side)];

    let interior_max =
        snarl_interior_max(graph, snarl.start, snarl.end, &boundary);

    TempSnarl {
        children,
        matrix: if oversized { Vec::new() } else { matrix },
        interior_min,
        interior_max,
        loop_start,
        loop_end,
        oversized,
    }
}

fn populate_chain<G: HandleGraph>(
    graph: &G,
    tree: &SnarlTree,
    chain_ix: usize,
    snarls: &[TempSnarl],
) -> TempChain {
    let chain = &tree.chains[chain_ix];
    let n = chain.nodes.len();
    let len =
        |ix: usize| -> u64 { graph.length(chain.nodes[ix]) as u64 };

    let mut prefix_sum = vec![Distance::Reachable(0); n];
    let mut max_prefix = vec![Distance::Reachable(0); n];
    let mut backward_loops = vec![Distance::Unreachable; n];
    let mut forward_loops = vec![Distance::Unreachable; n];

    for i in 0..n.saturating_sub(1) {
        let s = &snarls[chain.snarls[i]];
        prefix_sum[i + 1] =
            prefix_sum[i].add_bases(len(i)).add(s.interior_min);
        max_prefix[i + 1] =
            max_prefix[i].add_bases(len(i)).add(s.interior_max);
        backward_loops[i + 1] = s.loop_end.min(
            backward_loops[i]
                .add_bases(2 * len(i))
                .add(s.interior_min)
                .add(s.interior_min),
        );
    }

    for i in (0..n.saturating_sub(1)).rev() {
        let s = &snarls[chain.snarls[i]];
        forward_loops[i] = s.loop_start.min(
            forward_loops[i + 1]
                .add_bases(2 * len(i + 1))
                .add(s.interior_min)
                .add(s.interior_min),
        );
    }

    let min_length = prefix_sum[n - 1].add_bases(len(n - 1));
    let max_length = max_prefix[n - 1].add_bases(len(n - 1));

    TempChain {
        prefix_sum,
        forward_loops,
        backward_loops,
        max_prefix,
        min_length,
        max_length,
    }
}

/// Build the packed record vector for a decomposition over a frozen
/// graph. Snarls with more than `size_limit` children are stored as
/// `OVERSIZED_SNARL` without a pairwise matrix.
pub fn build_records<G: HandleGraph>(
    graph: &G,
    tree: &SnarlTree,
    size_limit: usize,
) -> Result<Vec<u64>> {
    let min_id = graph.min_node_id();
    let max_id = graph.max_node_id();
    if graph.node_count() == 0 {
        return Err(GraphError::invalid(
            "cannot index an empty graph",
        ));
    }

    // distances, bottom-up
    let temp_snarls: Vec<TempSnarl> = (0..tree.snarls.len())
        .map(|s| populate_snarl(graph, tree, s, size_limit))
        .collect();
    let temp_chains: Vec<TempChain> = (0..tree.chains.len())
        .map(|c| populate_chain(graph, tree, c, &temp_snarls))
        .collect();

    // layout pass: walk the forest and assign record offsets
    let id_span = (max_id.0 - min_id.0 + 1) as usize;
    let node_array_start = ROOT_HEADER + tree.roots.len();
    let mut cursor = node_array_start + id_span * NODE_RECORD_SIZE;

    let mut chain_offset = vec![0usize; tree.chains.len()];
    let mut snarl_offset = vec![0usize; tree.snarls.len()];

    // discovery order is already parent-before-child
    for c in 0..tree.chains.len() {
        chain_offset[c] = cursor;
        cursor += CHAIN_HEADER
            + tree.chains[c].nodes.len() * CHAIN_ENTRY_SIZE;
    }
    for s in 0..tree.snarls.len() {
        if tree.snarls[s].trivial {
            continue;
        }
        snarl_offset[s] = cursor;
        let temp = &temp_snarls[s];
        let c = temp.children.len();
        cursor += SNARL_HEADER + c;
        if !temp.oversized {
            cursor += triangle_len(2 * (c + 2));
        }
    }

    let mut vec = vec![0u64; cursor];
    let node_offset = |id: NodeId| -> usize {
        node_array_start + (id.0 - min_id.0) as usize * NODE_RECORD_SIZE
    };

    // root record
    vec[0] = ROOT;
    vec[1] = INDEX_VERSION;
    vec[2] = tree.roots.len() as u64;
    vec[3] = graph.node_count() as u64;
    vec[4] = min_id.0;
    vec[5] = max_id.0;
    for (ix, &root) in tree.roots.iter().enumerate() {
        vec[ROOT_HEADER + ix] = chain_offset[root] as u64;
    }

    // chain records and the node records of their members
    for (cix, chain) in tree.chains.iter().enumerate() {
        let off = chain_offset[cix];
        let temp = &temp_chains[cix];
        let n = chain.nodes.len();

        vec[off] = DISTANCED_CHAIN;
        vec[off + 1] = match chain.parent_snarl {
            Some(s) => snarl_offset[s] as u64,
            None => 0,
        };
        vec[off + 2] = match chain.parent_snarl {
            Some(s) => {
                // rank within the parent snarl's child list
                let rank = tree.snarls[s]
                    .children
                    .iter()
                    .position(|&c| c == cix)
                    .expect("chain missing from its parent snarl")
                    + 1;
                rank as u64
            }
            None => tree
                .roots
                .iter()
                .position(|&c| c == cix)
                .unwrap_or(0) as u64,
        };
        vec[off + 3] = temp.min_length.to_packed();
        vec[off + 4] = temp.max_length.to_packed();
        vec[off + 5] = n as u64;
        vec[off + 6] = chain.start.as_integer();
        vec[off + 7] = chain.end.as_integer();

        for (i, &member) in chain.nodes.iter().enumerate() {
            let base = off + CHAIN_HEADER + i * CHAIN_ENTRY_SIZE;
            vec[base] = member.id().0;
            vec[base + 1] = temp.prefix_sum[i].to_packed();
            vec[base + 2] = temp.forward_loops[i].to_packed();
            vec[base + 3] = temp.backward_loops[i].to_packed();
            vec[base + 4] = if i + 1 < n {
                let s = chain.snarls[i];
                if tree.snarls[s].trivial {
                    TRIVIAL_SNARL
                } else {
                    snarl_offset[s] as u64
                }
            } else {
                0
            };

            let noff = node_offset(member.id());
            vec[noff] = DISTANCED_NODE;
            vec[noff + 1] = off as u64;
            vec[noff + 2] = i as u64;
            vec[noff + 3] = graph.length(member) as u64;
            vec[noff + 4] = member.is_reverse() as u64;
        }
    }

    // snarl records, their child pointers, and the node records of
    // plain interior nodes
    for (six, snarl) in tree.snarls.iter().enumerate() {
        if snarl.trivial {
            continue;
        }
        let off = snarl_offset[six];
        let temp = &temp_snarls[six];
        let c = temp.children.len();

        vec[off] = if temp.oversized {
            OVERSIZED_SNARL
        } else {
            DISTANCED_SNARL
        };
        vec[off + 1] = chain_offset[snarl.parent_chain] as u64;
        vec[off + 2] = tree.chains[snarl.parent_chain]
            .snarls
            .iter()
            .position(|&s| s == six)
            .expect("snarl missing from its parent chain")
            as u64;
        let start_len = graph.length(snarl.start) as u64;
        let end_len = graph.length(snarl.end) as u64;
        vec[off + 3] = temp
            .interior_min
            .add_bases(start_len + end_len)
            .to_packed();
        vec[off + 4] = temp
            .interior_max
            .add_bases(start_len + end_len)
            .to_packed();
        vec[off + 5] = (c + 2) as u64;
        vec[off + 6] = snarl.start.as_integer();
        vec[off + 7] = start_len;
        vec[off + 8] = snarl.end.as_integer();
        vec[off + 9] = end_len;
        vec[off + 10] = temp.loop_start.to_packed();
        vec[off + 11] = temp.loop_end.to_packed();
        vec[off + 12] = c as u64;

        for (ix, child) in temp.children.iter().enumerate() {
            let rank = ix + 1;
            vec[off + SNARL_HEADER + ix] = match child.kind {
                ChildKind::Chain(chain) => chain_offset[chain] as u64,
                ChildKind::Node(id) => {
                    let noff = node_offset(id);
                    vec[noff] = DISTANCED_NODE;
                    vec[noff + 1] = off as u64;
                    vec[noff + 2] = rank as u64;
                    vec[noff + 3] =
                        graph.length(Handle::pack(id, false)) as u64;
                    vec[noff + 4] = 0;
                    noff as u64
                }
            };
        }

        if !temp.oversized {
            let matrix_base = off + SNARL_HEADER + c;
            for (ix, d) in temp.matrix.iter().enumerate() {
                vec[matrix_base + ix] = d.to_packed();
            }
        }
    }

    debug!(
        "distance index: {} slots, {} chains, {} snarls",
        vec.len(),
        tree.chains.len(),
        tree.snarls.len()
    );

    Ok(vec)
}
