use fnv::FnvHashMap;

use gfa::{gfa::GFA, optfields::OptFields};

use crate::{
    handle::{Direction, Edge, Handle, NodeId},
    pathgraph::PathId,
};

use super::{Node, OccurIter, Path};

/// A handlegraph implementation using `HashMap` to represent the
/// graph topology and nodes, and each path as a `Vec` of mappings.
///
/// Edges live in the side-attached adjacency lists of their endpoint
/// nodes; `edge_overlaps` carries the overlap lengths of
/// assembly-style edges, keyed by canonical edge, with absent meaning
/// blunt.
#[derive(Debug)]
pub struct HashGraph {
    pub max_id: NodeId,
    pub min_id: NodeId,
    pub graph: FnvHashMap<NodeId, Node>,
    pub edge_overlaps: FnvHashMap<Edge, usize>,
    pub path_id: FnvHashMap<Vec<u8>, PathId>,
    pub paths: FnvHashMap<PathId, Path>,
    pub(crate) edge_count: usize,
    pub(crate) next_path_id: PathId,
}

impl Default for HashGraph {
    fn default() -> HashGraph {
        HashGraph {
            max_id: NodeId::from(0u64),
            min_id: NodeId::from(std::u64::MAX),
            graph: Default::default(),
            edge_overlaps: Default::default(),
            path_id: Default::default(),
            paths: Default::default(),
            edge_count: 0,
            next_path_id: 0,
        }
    }
}

impl HashGraph {
    pub fn new() -> HashGraph {
        Default::default()
    }

    pub fn from_gfa<T: OptFields>(gfa: &GFA<usize, T>) -> HashGraph {
        crate::conversion::from_gfa(gfa)
    }

    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        self.graph.get(node_id)
    }

    pub fn get_node_unchecked(&self, node_id: &NodeId) -> &Node {
        self.graph.get(node_id).unwrap_or_else(|| {
            panic!("Tried getting a node that doesn't exist, ID: {:?}", node_id)
        })
    }

    pub fn get_node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.graph.get_mut(node_id)
    }

    pub fn get_path(&self, path_id: &PathId) -> Option<&Path> {
        self.paths.get(path_id)
    }

    pub fn get_path_unchecked(&self, path_id: &PathId) -> &Path {
        self.paths.get(path_id).unwrap_or_else(|| {
            panic!("Tried to look up nonexistent path {}", path_id)
        })
    }

    pub fn get_path_mut(&mut self, path_id: &PathId) -> Option<&mut Path> {
        self.paths.get_mut(path_id)
    }

    /// The overlap length of an edge; 0 if blunt or absent.
    pub fn edge_overlap(&self, edge: Edge) -> usize {
        self.edge_overlaps
            .get(&edge.canonical())
            .copied()
            .unwrap_or(0)
    }

    /// Iterator over the neighbors of a handle, strand-aware.
    pub fn neighbors(&self, handle: Handle, dir: Direction) -> NeighborIter {
        let node = self.get_node_unchecked(&handle.id());

        let handles = match (dir, handle.is_reverse()) {
            (Direction::Left, true) => &node.right_edges,
            (Direction::Left, false) => &node.left_edges,
            (Direction::Right, true) => &node.left_edges,
            (Direction::Right, false) => &node.right_edges,
        };

        NeighborIter::new(handles.iter(), dir == Direction::Left)
    }

    /// Occurrence iterator over every (path, mapping index) on either
    /// strand of the handle's node.
    pub fn occurrences(&self, handle: Handle) -> OccurIter {
        let node = self.get_node_unchecked(&handle.id());
        OccurIter {
            paths: node.occurrences.iter(),
            current: None,
        }
    }

    /// Drop the occurrence entries of one path from every node its
    /// mappings touch. Call before rewriting the path's mapping list.
    pub(crate) fn clear_occurrences(&mut self, path_id: PathId) {
        let ids: Vec<NodeId> = match self.paths.get(&path_id) {
            None => return,
            Some(path) => path.mappings.iter().map(|m| m.pos.id()).collect(),
        };
        for id in ids {
            if let Some(node) = self.graph.get_mut(&id) {
                node.clear_occurrences_of(path_id);
            }
        }
    }

    /// Rebuild the occurrence entries of one path from its mapping
    /// list.
    pub(crate) fn index_occurrences(&mut self, path_id: PathId) {
        let steps: Vec<(NodeId, usize)> = match self.paths.get(&path_id) {
            None => return,
            Some(path) => path
                .mappings
                .iter()
                .enumerate()
                .map(|(ix, m)| (m.pos.id(), ix))
                .collect(),
        };
        for (id, ix) in steps {
            if let Some(node) = self.graph.get_mut(&id) {
                node.add_occurrence(path_id, ix);
            }
        }
    }

    /// The perfect-path-neighbor predicate: `left` and `right` can be
    /// merged across this adjacency without disturbing any path.
    /// Every visit to `left` must continue directly into `right`,
    /// every visit to `right` must be one of those continuations, and
    /// all the mappings involved must be full-node single-match
    /// mappings.
    pub fn perfect_path_neighbors(&self, left: Handle, right: Handle) -> bool {
        let left_len = self.get_node_unchecked(&left.id()).sequence.len();
        let right_len = self.get_node_unchecked(&right.id()).sequence.len();

        let mut expected_next = 0usize;

        for (path_id, ix) in self.occurrences(left) {
            let path = self.get_path_unchecked(&path_id);
            let mapping = &path.mappings[ix];

            if !mapping.is_full_node_match(left_len) {
                return false;
            }

            let step_is_rev = mapping.pos.handle != left;

            let next_ix = if step_is_rev {
                ix.checked_sub(1)
            } else if ix + 1 < path.len() {
                Some(ix + 1)
            } else {
                None
            };

            match next_ix {
                None => return false,
                Some(next_ix) => {
                    let next = &path.mappings[next_ix];
                    let mut next_handle = next.pos.handle;
                    if step_is_rev {
                        next_handle = next_handle.flip();
                    }
                    if next_handle != right
                        || !next.is_full_node_match(right_len)
                    {
                        return false;
                    }
                    expected_next += 1;
                }
            }
        }

        let observed_next = self.occurrences(right).count();

        observed_next == expected_next
    }
}

/// Iterator over one adjacency list, flipping entries when walking
/// leftward so the yielded handles read toward the origin.
pub struct NeighborIter<'a> {
    iter: std::slice::Iter<'a, Handle>,
    flip: bool,
}

impl<'a> NeighborIter<'a> {
    fn new(iter: std::slice::Iter<'a, Handle>, flip: bool) -> Self {
        NeighborIter { iter, flip }
    }
}

impl<'a> Iterator for NeighborIter<'a> {
    type Item = Handle;

    #[inline]
    fn next(&mut self) -> Option<Handle> {
        let h = self.iter.next()?;
        Some(if self.flip { h.flip() } else { *h })
    }
}
