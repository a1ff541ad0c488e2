/*!

`HashGraph` node definition and occurrence iterator

*/

use fnv::FnvHashMap;

use crate::handle::Handle;
use crate::pathgraph::PathId;

/// A stored node: its forward-strand sequence, the two side-attached
/// adjacency lists, and the occurrences of path mappings on it.
///
/// `left_edges` holds neighbor handles oriented leaving leftward,
/// `right_edges` leaving rightward, both relative to the node's
/// forward orientation. `occurrences` maps a path id to the indices
/// of that path's mappings anchored on this node; a path may visit a
/// node any number of times.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub sequence: Vec<u8>,
    pub left_edges: Vec<Handle>,
    pub right_edges: Vec<Handle>,
    pub occurrences: FnvHashMap<PathId, Vec<usize>>,
}

impl Node {
    pub fn new(sequence: &[u8]) -> Node {
        Node {
            sequence: sequence.into(),
            left_edges: vec![],
            right_edges: vec![],
            occurrences: FnvHashMap::default(),
        }
    }

    pub(super) fn add_occurrence(&mut self, path: PathId, index: usize) {
        self.occurrences.entry(path).or_default().push(index);
    }

    pub(super) fn clear_occurrences_of(&mut self, path: PathId) {
        self.occurrences.remove(&path);
    }
}

/// Iterator on the path occurrences of a node
pub struct OccurIter<'a> {
    pub(super) paths: std::collections::hash_map::Iter<'a, PathId, Vec<usize>>,
    pub(super) current: Option<(PathId, std::slice::Iter<'a, usize>)>,
}

impl<'a> Iterator for OccurIter<'a> {
    type Item = (PathId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((path_id, ref mut ixs)) = self.current {
                if let Some(ix) = ixs.next() {
                    return Some((path_id, *ix));
                }
            }
            let (path_id, ixs) = self.paths.next()?;
            self.current = Some((*path_id, ixs.iter()));
        }
    }
}
