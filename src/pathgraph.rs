/*!

Embedded paths: the mapping/edit data model and the trait for graphs
that carry named, rank-ordered walks.

A path is a named, ordered sequence of mappings. Each mapping anchors
at a base position on an oriented node and carries a list of edits
describing how the path relates to the node sequence there. Embedded
paths normally consist of full-node perfect matches; the edit engine
consumes paths with arbitrary edits.

*/

use crate::error::Result;
use crate::handle::{Handle, Pos};

pub type PathId = i64;

/// A quantum of a mapping: `from_len` reference bases replaced by
/// `to_len` path bases. A perfect match has equal lengths and an
/// empty sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edit {
    pub from_len: usize,
    pub to_len: usize,
    pub seq: Vec<u8>,
}

impl Edit {
    pub fn match_(len: usize) -> Edit {
        Edit {
            from_len: len,
            to_len: len,
            seq: Vec::new(),
        }
    }

    pub fn insertion(seq: &[u8]) -> Edit {
        Edit {
            from_len: 0,
            to_len: seq.len(),
            seq: seq.into(),
        }
    }

    pub fn deletion(len: usize) -> Edit {
        Edit {
            from_len: len,
            to_len: 0,
            seq: Vec::new(),
        }
    }

    pub fn substitution(from_len: usize, seq: &[u8]) -> Edit {
        Edit {
            from_len,
            to_len: seq.len(),
            seq: seq.into(),
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.from_len == self.to_len && self.seq.is_empty()
    }

    #[inline]
    pub fn is_insertion(&self) -> bool {
        self.from_len == 0 && self.to_len > 0
    }

    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.from_len > 0 && self.to_len == 0
    }
}

/// One path element: a position plus the edits applied from there.
/// Covers `from_len()` bases of its node starting at `pos`, read on
/// the position's strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub pos: Pos,
    pub edits: Vec<Edit>,
    pub rank: usize,
}

impl Mapping {
    /// A full-node perfect match on `handle`, the shape of an
    /// ordinary embedded path step.
    pub fn full_match(handle: Handle, node_len: usize, rank: usize) -> Mapping {
        Mapping {
            pos: Pos { handle, offset: 0 },
            edits: vec![Edit::match_(node_len)],
            rank,
        }
    }

    /// Reference bases covered on the node.
    pub fn from_len(&self) -> usize {
        self.edits.iter().map(|e| e.from_len).sum()
    }

    /// Path bases produced.
    pub fn to_len(&self) -> usize {
        self.edits.iter().map(|e| e.to_len).sum()
    }

    /// True if the mapping is nothing but match edits.
    pub fn is_perfect(&self) -> bool {
        self.edits.iter().all(Edit::is_match)
    }

    /// True if the mapping is a single match edit spanning the whole
    /// node.
    pub fn is_full_node_match(&self, node_len: usize) -> bool {
        self.pos.offset == 0
            && self.edits.len() == 1
            && self.edits[0].is_match()
            && self.edits[0].from_len == node_len
    }

    /// Merge runs of adjacent match edits into single edits.
    pub fn simplify(&mut self) {
        let mut simplified: Vec<Edit> = Vec::with_capacity(self.edits.len());
        for edit in self.edits.drain(..) {
            match simplified.last_mut() {
                Some(prev) if prev.is_match() && edit.is_match() => {
                    prev.from_len += edit.from_len;
                    prev.to_len += edit.to_len;
                }
                _ => simplified.push(edit),
            }
        }
        self.edits = simplified;
    }
}

/// Trait for both immutable and mutable access to the paths embedded
/// in a graph.
///
/// Mapping indices returned here are positions in the path's mapping
/// list; any insertion or removal invalidates indices after the
/// affected point.
pub trait PathHandleGraph {
    fn path_count(&self) -> usize;

    fn has_path(&self, name: &[u8]) -> bool;

    fn get_path_id(&self, name: &[u8]) -> Option<PathId>;

    fn path_name(&self, path_id: PathId) -> Option<&[u8]>;

    fn path_is_circular(&self, path_id: PathId) -> Option<bool>;

    fn set_circularity(&mut self, path_id: PathId, circular: bool)
        -> Result<()>;

    /// Create an empty path. Fails if the name is taken.
    fn create_path(&mut self, name: &[u8], is_circular: bool)
        -> Result<PathId>;

    fn destroy_path(&mut self, path_id: PathId) -> Result<()>;

    fn mapping_count(&self, path_id: PathId) -> usize;

    /// Append a mapping, assigning it the next rank.
    fn append_mapping(&mut self, path_id: PathId, mapping: Mapping)
        -> Result<usize>;

    /// Append a full-node perfect-match mapping on `handle`.
    fn append_step(&mut self, path_id: PathId, handle: Handle)
        -> Result<usize>;

    /// Insert a mapping before the mapping currently at `index`.
    /// Ranks after the insertion point are shifted; call
    /// `compact_ranks` before relying on rank density.
    fn insert_mapping(
        &mut self,
        path_id: PathId,
        index: usize,
        mapping: Mapping,
    ) -> Result<usize>;

    /// Remove and return the mapping at `index`.
    fn remove_mapping(&mut self, path_id: PathId, index: usize)
        -> Result<Mapping>;

    /// Split the mapping at `index` into two mappings summing to the
    /// original, cut at `offset` bases into its reference span.
    fn divide_mapping(
        &mut self,
        path_id: PathId,
        index: usize,
        offset: usize,
    ) -> Result<(usize, usize)>;

    /// Point the mapping at `index` at a different handle, keeping
    /// offset and edits. Used when nodes are merged or renumbered.
    fn swap_mapping_node(
        &mut self,
        path_id: PathId,
        index: usize,
        handle: Handle,
    ) -> Result<()>;

    /// Renumber the path's ranks 1..k in list order.
    fn compact_ranks(&mut self, path_id: PathId) -> Result<()>;

    /// Total path bases (sum of mapping `to_len`s).
    fn path_bases_len(&self, path_id: PathId) -> Option<usize>;

    fn mappings_iter<'a>(
        &'a self,
        path_id: PathId,
    ) -> Box<dyn Iterator<Item = &'a Mapping> + 'a>;

    fn path_ids_iter<'a>(&'a self) -> Box<dyn Iterator<Item = PathId> + 'a>;

    /// All (path, mapping index) occurrences on either strand of the
    /// handle's node.
    fn steps_on_handle<'a>(
        &'a self,
        handle: Handle,
    ) -> Box<dyn Iterator<Item = (PathId, usize)> + 'a>;
}
