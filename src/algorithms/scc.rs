/*!

Strongly connected components over oriented traversals: Tarjan's
algorithm run on the handle digraph (two vertices per node), with an
explicit stack instead of recursion, since pangenome diameters easily
overflow the call stack.

*/

use std::collections::BTreeSet;

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    handle::{Direction, Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
};

/// The strongly connected components of the handle digraph, as sets
/// of handles. Every component's mirror image (all handles flipped)
/// is also a component and is retained here; use
/// [`strongly_connected_components`] for the coalesced node-id view.
pub fn strong_components_handles(graph: &HashGraph) -> Vec<Vec<Handle>> {
    let mut index: FnvHashMap<Handle, usize> = FnvHashMap::default();
    let mut lowlink: FnvHashMap<Handle, usize> = FnvHashMap::default();
    let mut on_stack: FnvHashSet<Handle> = FnvHashSet::default();
    let mut stack: Vec<Handle> = Vec::new();
    let mut counter = 0usize;
    let mut components: Vec<Vec<Handle>> = Vec::new();

    struct Frame {
        handle: Handle,
        neighbors: Vec<Handle>,
        next: usize,
    }

    let mut roots: Vec<Handle> = graph
        .handles_iter()
        .flat_map(|h| vec![h, h.flip()])
        .collect();
    roots.sort();

    for root in roots {
        if index.contains_key(&root) {
            continue;
        }

        let mut frames: Vec<Frame> = Vec::new();

        index.insert(root, counter);
        lowlink.insert(root, counter);
        counter += 1;
        stack.push(root);
        on_stack.insert(root);
        frames.push(Frame {
            handle: root,
            neighbors: graph.neighbors(root, Direction::Right).collect(),
            next: 0,
        });

        while !frames.is_empty() {
            let (v, advance) = {
                let frame = frames.last_mut().unwrap();
                if frame.next < frame.neighbors.len() {
                    let w = frame.neighbors[frame.next];
                    frame.next += 1;
                    (frame.handle, Some(w))
                } else {
                    (frame.handle, None)
                }
            };

            match advance {
                Some(w) => {
                    if !index.contains_key(&w) {
                        index.insert(w, counter);
                        lowlink.insert(w, counter);
                        counter += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        frames.push(Frame {
                            handle: w,
                            neighbors: graph
                                .neighbors(w, Direction::Right)
                                .collect(),
                            next: 0,
                        });
                    } else if on_stack.contains(&w) {
                        let low = std::cmp::min(lowlink[&v], index[&w]);
                        lowlink.insert(v, low);
                    }
                }
                None => {
                    if lowlink[&v] == index[&v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().unwrap();
                            on_stack.remove(&w);
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        components.push(component);
                    }
                    frames.pop();
                    if let Some(parent) = frames.last() {
                        let p = parent.handle;
                        let low = std::cmp::min(lowlink[&p], lowlink[&v]);
                        lowlink.insert(p, low);
                    }
                }
            }
        }
    }

    components
}

/// The strongly connected components as node-id sets, with the two
/// orientations of each node coalesced: a component and its mirror
/// collapse to one entry.
pub fn strongly_connected_components(
    graph: &HashGraph,
) -> Vec<BTreeSet<NodeId>> {
    let mut seen: FnvHashSet<Vec<NodeId>> = FnvHashSet::default();
    let mut out: Vec<BTreeSet<NodeId>> = Vec::new();

    for comp in strong_components_handles(graph) {
        let ids: BTreeSet<NodeId> = comp.iter().map(|h| h.id()).collect();
        let key: Vec<NodeId> = ids.iter().copied().collect();
        if seen.insert(key) {
            out.push(ids);
        }
    }

    out.sort_by(|a, b| a.iter().next().cmp(&b.iter().next()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Edge;
    use crate::mutablehandlegraph::*;

    fn ids(sets: &[BTreeSet<NodeId>]) -> Vec<Vec<u64>> {
        sets.iter()
            .map(|s| s.iter().map(|id| id.0).collect())
            .collect()
    }

    #[test]
    fn acyclic_graph_has_singleton_components() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"A");
        let h2 = graph.append_handle(b"C");
        graph.create_edge(Edge(h1, h2)).unwrap();

        let comps = strongly_connected_components(&graph);
        assert_eq!(ids(&comps), vec![vec![1], vec![2]]);
    }

    #[test]
    fn directed_cycle_is_one_component() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"A");
        let h2 = graph.append_handle(b"C");
        let h3 = graph.append_handle(b"G");
        graph.create_edge(Edge(h1, h2)).unwrap();
        graph.create_edge(Edge(h2, h3)).unwrap();
        graph.create_edge(Edge(h3, h1)).unwrap();

        let comps = strongly_connected_components(&graph);
        assert_eq!(ids(&comps), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn inverting_self_loop_coalesces_to_single_set() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AAAA");
        graph.create_edge(Edge(h1, h1.flip())).unwrap();

        let comps = strongly_connected_components(&graph);
        assert_eq!(ids(&comps), vec![vec![1]]);
    }
}
