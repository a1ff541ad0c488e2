/*!

Phase unfolding: rebuild the pruned regions of a working graph as
disjoint haplotype-supported walks.

The unfolder reads the original graph (for sequences and id bounds)
and a haplotype index (for supported adjacencies and walk
extensions), finds the connected components of the edges missing from
the working graph, enumerates every border-to-border or maximal walk
the haplotypes support through each component, and splices the walks
back in with freshly-numbered interior nodes so they stay disjoint.

*/

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    disjoint::DisjointSets,
    error::Result,
    handle::{Edge, Handle, NodeId},
    handlegraph::HandleGraph,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
};

#[allow(unused_imports)]
use log::{debug, info};

/// The haplotype search protocol: an opaque state that can be seeded
/// on one traversal and extended one traversal at a time. The
/// unfolder never inspects state internals; it only checks whether a
/// proposed extension is supported by any haplotype.
pub trait HaplotypeIndex {
    type State: Clone;

    /// Begin a search on a single traversal, on either strand.
    fn begin(&self, handle: Handle) -> Option<Self::State>;

    /// Extend the search by one traversal.
    fn extend(&self, state: &Self::State, next: Handle)
        -> Option<Self::State>;

    /// Every adjacency used by at least one haplotype, in canonical
    /// edge orientation.
    fn for_each_edge(&self, f: &mut dyn FnMut(Edge));
}

/// An explicit in-memory haplotype index: a set of threads, each an
/// ordered walk of traversals. Searches match contiguous subwalks of
/// any thread, on either strand.
#[derive(Debug, Clone, Default)]
pub struct HaplotypeSet {
    threads: Vec<Vec<Handle>>,
}

/// One live match of a search prefix: thread, position of the last
/// matched traversal, and whether the thread is being read backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadMatch {
    thread: usize,
    position: usize,
    backward: bool,
}

impl HaplotypeSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, thread: Vec<Handle>) {
        if !thread.is_empty() {
            self.threads.push(thread);
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

impl HaplotypeIndex for HaplotypeSet {
    type State = Vec<ThreadMatch>;

    fn begin(&self, handle: Handle) -> Option<Self::State> {
        let mut matches = Vec::new();
        for (t, thread) in self.threads.iter().enumerate() {
            for (i, &h) in thread.iter().enumerate() {
                if h == handle {
                    matches.push(ThreadMatch {
                        thread: t,
                        position: i,
                        backward: false,
                    });
                }
                if h == handle.flip() {
                    matches.push(ThreadMatch {
                        thread: t,
                        position: i,
                        backward: true,
                    });
                }
            }
        }
        if matches.is_empty() {
            None
        } else {
            Some(matches)
        }
    }

    fn extend(
        &self,
        state: &Self::State,
        next: Handle,
    ) -> Option<Self::State> {
        let mut extended = Vec::new();
        for m in state.iter() {
            let thread = &self.threads[m.thread];
            if m.backward {
                if m.position > 0 && thread[m.position - 1] == next.flip() {
                    extended.push(ThreadMatch {
                        thread: m.thread,
                        position: m.position - 1,
                        backward: true,
                    });
                }
            } else if m.position + 1 < thread.len()
                && thread[m.position + 1] == next
            {
                extended.push(ThreadMatch {
                    thread: m.thread,
                    position: m.position + 1,
                    backward: false,
                });
            }
        }
        if extended.is_empty() {
            None
        } else {
            Some(extended)
        }
    }

    fn for_each_edge(&self, f: &mut dyn FnMut(Edge)) {
        let mut seen: FnvHashSet<Edge> = FnvHashSet::default();
        for thread in self.threads.iter() {
            for pair in thread.windows(2) {
                let edge = Edge::edge_handle(pair[0], pair[1]);
                if seen.insert(edge) {
                    f(edge);
                }
            }
        }
    }
}

/// Transforms the pruned subregions of a working graph into
/// collections of disjoint haplotype walks. Construct it over the
/// original graph's accessor and a haplotype index for the same
/// graph; `next_node` should be `max_node_id() + 1` of the original.
pub struct PhaseUnfolder<'a, G: HandleGraph, H: HaplotypeIndex> {
    original: &'a G,
    haplotypes: &'a H,
    next_node: NodeId,
}

impl<'a, G: HandleGraph, H: HaplotypeIndex> PhaseUnfolder<'a, G, H> {
    pub fn new(
        original: &'a G,
        haplotypes: &'a H,
        next_node: NodeId,
    ) -> Self {
        PhaseUnfolder {
            original,
            haplotypes,
            next_node,
        }
    }

    /// Unfold the pruned regions of `graph`. Returns the number of
    /// haplotype walks spliced in.
    pub fn unfold(&mut self, graph: &mut HashGraph) -> Result<usize> {
        let components = self.complement_components(graph);
        debug!("unfolding {} complement components", components.len());

        let mut inserted = 0usize;
        for component in components {
            inserted += self.unfold_component(&component, graph)?;
        }
        Ok(inserted)
    }

    /// The edges present in the haplotype index but absent from the
    /// working graph, partitioned into connected components.
    fn complement_components(&self, graph: &HashGraph) -> Vec<Vec<Edge>> {
        let mut complement: Vec<Edge> = Vec::new();
        self.haplotypes.for_each_edge(&mut |edge| {
            let Edge(l, r) = edge;
            let present = graph.has_node(l.id())
                && graph.has_node(r.id())
                && graph.has_edge(l, r);
            if !present {
                complement.push(edge);
            }
        });

        if complement.is_empty() {
            return Vec::new();
        }

        // dense ids for the union-find
        let mut dense: FnvHashMap<NodeId, u64> = FnvHashMap::default();
        for Edge(l, r) in complement.iter() {
            let next = dense.len() as u64;
            dense.entry(l.id()).or_insert(next);
            let next = dense.len() as u64;
            dense.entry(r.id()).or_insert(next);
        }

        let sets = DisjointSets::new(dense.len());
        for Edge(l, r) in complement.iter() {
            sets.unite(dense[&l.id()], dense[&r.id()]);
        }

        let mut grouped: FnvHashMap<u64, Vec<Edge>> = FnvHashMap::default();
        for edge in complement {
            let root = sets.find(dense[&edge.0.id()]);
            grouped.entry(root).or_default().push(edge);
        }

        let mut components: Vec<Vec<Edge>> = grouped.into_values().collect();
        for comp in components.iter_mut() {
            comp.sort();
        }
        components.sort();
        components
    }

    /// Enumerate the supported walks of one component and splice them
    /// into the working graph with fresh interior ids.
    fn unfold_component(
        &mut self,
        component: &[Edge],
        graph: &mut HashGraph,
    ) -> Result<usize> {
        // border nodes still exist in the working graph
        let mut nodes: FnvHashSet<NodeId> = FnvHashSet::default();
        for Edge(l, r) in component.iter() {
            nodes.insert(l.id());
            nodes.insert(r.id());
        }
        let border: FnvHashSet<NodeId> = nodes
            .iter()
            .copied()
            .filter(|id| graph.has_node(*id))
            .collect();

        // arc lists over the component's edges
        let mut arcs: FnvHashMap<Handle, Vec<Handle>> = FnvHashMap::default();
        for &Edge(l, r) in component.iter() {
            arcs.entry(l).or_default().push(r);
            arcs.entry(r.flip()).or_default().push(l.flip());
        }
        for targets in arcs.values_mut() {
            targets.sort();
            targets.dedup();
        }

        let mut walks: FnvHashSet<Vec<Handle>> = FnvHashSet::default();
        let mut border_sorted: Vec<NodeId> =
            border.iter().copied().collect();
        border_sorted.sort();

        for &id in border_sorted.iter() {
            for &rev in [false, true].iter() {
                self.generate_walks(
                    Handle::pack(id, rev),
                    &arcs,
                    &border,
                    &mut walks,
                );
            }
        }

        let mut walks: Vec<Vec<Handle>> = walks.into_iter().collect();
        walks.sort();

        for walk in walks.iter() {
            self.insert_walk(walk, &border, graph)?;
        }

        Ok(walks.len())
    }

    /// Depth-first search over `(search state, walk so far)` pairs,
    /// extending only through component arcs the haplotype index
    /// supports. A walk ends at another border node or when no
    /// extension is supported; either way it is recorded in
    /// canonical orientation.
    fn generate_walks(
        &self,
        from: Handle,
        arcs: &FnvHashMap<Handle, Vec<Handle>>,
        border: &FnvHashSet<NodeId>,
        walks: &mut FnvHashSet<Vec<Handle>>,
    ) {
        let start_state = match self.haplotypes.begin(from) {
            Some(state) => state,
            None => return,
        };

        let mut stack: Vec<(H::State, Vec<Handle>)> =
            vec![(start_state, vec![from])];

        while let Some((state, walk)) = stack.pop() {
            let last = *walk.last().unwrap();
            let mut extended = false;

            if let Some(nexts) = arcs.get(&last) {
                for &next in nexts.iter() {
                    if let Some(next_state) =
                        self.haplotypes.extend(&state, next)
                    {
                        let mut next_walk = walk.clone();
                        next_walk.push(next);
                        if border.contains(&next.id()) {
                            Self::insert_canonical(next_walk, walks);
                        } else {
                            stack.push((next_state, next_walk));
                        }
                        extended = true;
                    }
                }
            }

            if !extended && walk.len() > 1 {
                Self::insert_canonical(walk, walks);
            }
        }
    }

    /// Store the lexicographically smaller of the walk and its
    /// reverse complement.
    fn insert_canonical(
        walk: Vec<Handle>,
        walks: &mut FnvHashSet<Vec<Handle>>,
    ) {
        let reverse: Vec<Handle> =
            walk.iter().rev().map(|h| h.flip()).collect();
        if reverse < walk {
            walks.insert(reverse);
        } else {
            walks.insert(walk);
        }
    }

    /// Splice one walk into the working graph: borders keep their
    /// ids, interior nodes are duplicated under fresh ids.
    fn insert_walk(
        &mut self,
        walk: &[Handle],
        border: &FnvHashSet<NodeId>,
        graph: &mut HashGraph,
    ) -> Result<()> {
        let mut prev: Option<Handle> = None;

        for &h in walk.iter() {
            let mapped = if border.contains(&h.id()) {
                h
            } else {
                let id = self.next_node;
                self.next_node = self.next_node + 1;
                let fwd = Handle::pack(h.id(), false);
                graph.create_handle(
                    self.original.sequence_slice(fwd),
                    id,
                )?;
                Handle::pack(id, h.is_reverse())
            };

            if let Some(prev) = prev {
                graph.create_edge(Edge(prev, mapped))?;
            }
            prev = Some(mapped);
        }

        Ok(())
    }
}
