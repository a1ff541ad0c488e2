use crate::{
    handle::{Direction, Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
};

use fnv::{FnvHashMap, FnvHashSet};

/// How a rewritten graph's nodes map back to the source graph:
/// `new id -> (original id, reads the original's reverse strand)`.
pub type NodeTranslation = FnvHashMap<NodeId, (NodeId, bool)>;

use boomphf::*;

use crate::disjoint::DisjointSets;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

pub mod bluntify;
pub mod chop;
pub mod dagify;
pub mod normalize;
pub mod scc;
pub mod topological;
pub mod unchop;
pub mod unroll;

pub use self::bluntify::bluntify;
pub use self::chop::chop;
pub use self::dagify::dagify;
pub use self::normalize::normalize;
pub use self::scc::strongly_connected_components;
pub use self::topological::{is_cyclic, topological_order, topological_sort};
pub use self::unchop::unchop;
pub use self::unroll::unfold;

/// Find the maximal simple components of the graph: runs of handles
/// u₁…uₖ where each consecutive pair is a perfect path neighbor and
/// each internal boundary has degree one on both sides. Components
/// shorter than `min_size` are dropped. The returned components are
/// in walk order.
pub fn simple_components(
    graph: &HashGraph,
    min_size: usize,
) -> Vec<Vec<Handle>> {
    debug!("in simple components");

    let mut bphf_data = Vec::with_capacity((1 + graph.node_count()) * 2);

    for handle in graph.handles_iter() {
        bphf_data.push(handle.0);
        bphf_data.push(handle.flip().0);
    }

    let bphf = Mphf::new_parallel(1.7, &bphf_data, None);

    let disj_set = DisjointSets::new(bphf_data.len() + 1);

    debug!(
        "building disjoint set structure for {} nodes",
        graph.node_count()
    );
    let t = std::time::Instant::now();
    graph.par_for_each_handle(|handle| {
        let h_i = bphf.hash(&handle.0);
        let h_j = bphf.hash(&handle.flip().0);
        disj_set.unite(h_i, h_j);

        if graph.degree(handle, Direction::Left) == 1 {
            for prev in graph.neighbors(handle, Direction::Left) {
                if graph.degree(prev, Direction::Right) == 1
                    && prev.id() != handle.id()
                    && graph.perfect_path_neighbors(prev, handle)
                {
                    let from = bphf.hash(&prev.forward().0);
                    let to = bphf.hash(&handle.0);
                    disj_set.unite(from, to);
                }
            }
        }

        if graph.degree(handle, Direction::Right) == 1 {
            for next in graph.neighbors(handle, Direction::Right) {
                if graph.degree(next, Direction::Left) == 1
                    && next.id() != handle.id()
                    && graph.perfect_path_neighbors(handle, next)
                {
                    let from = bphf.hash(&handle.0);
                    let to = bphf.hash(&next.forward().0);
                    disj_set.unite(from, to);
                }
            }
        }
    });
    debug!(
        "disjoint set populated in {:.3} ms",
        t.elapsed().as_secs_f64() * 1000.0
    );

    let mut components: FnvHashMap<u64, Vec<Handle>> = FnvHashMap::default();

    for handle in graph.handles_iter() {
        let a_id = disj_set.find(bphf.hash(&handle.0));
        components.entry(a_id).or_default().push(handle);
    }

    debug!("found {} components", components.len());

    let mut handle_components: Vec<Vec<Handle>> = Vec::new();

    let t = std::time::Instant::now();
    for comp in components.values_mut() {
        if comp.len() < min_size {
            continue;
        }

        comp.sort();
        let comp_set: FnvHashSet<Handle> = comp.iter().copied().collect();

        // walk left to the start of the run
        let mut handle = *comp.first().unwrap();
        let base = handle;

        loop {
            let mut prev = handle;
            if graph.degree(handle, Direction::Left) == 1 {
                prev =
                    graph.neighbors(handle, Direction::Left).next().unwrap();
            }

            if handle != prev
                && prev.forward() != base
                && comp_set.contains(&prev.forward())
            {
                handle = prev;
            } else {
                break;
            }
        }

        // then collect the run left to right
        let base = handle;
        let mut sorted_comp: Vec<Handle> = Vec::new();

        loop {
            sorted_comp.push(handle);
            let mut next = handle;
            if graph.degree(handle, Direction::Right) == 1 {
                next =
                    graph.neighbors(handle, Direction::Right).next().unwrap();
            }

            if handle != next
                && next.forward() != base.forward()
                && comp_set.contains(&next.forward())
            {
                handle = next;
            } else {
                break;
            }
        }

        if sorted_comp.len() >= min_size {
            handle_components.push(sorted_comp);
        }
    }

    debug!(
        "sorted components in {:.3} ms",
        t.elapsed().as_secs_f64() * 1000.0
    );

    handle_components.sort_by_key(|comp| comp.first().map(|h| h.0));

    handle_components
}
