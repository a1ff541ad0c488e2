use bio::alphabets::dna;

use fnv::{FnvHashMap, FnvHashSet};

use rayon::prelude::*;

use crate::{
    error::{GraphError, Result},
    handle::{Direction, Edge, Handle, NodeId, Pos},
    handlegraph::*,
    mutablehandlegraph::*,
    pathgraph::{Mapping, PathHandleGraph, PathId},
};

pub mod graph;
pub mod node;
pub mod path;

pub use self::graph::{HashGraph, NeighborIter};
pub use self::node::{Node, OccurIter};
pub use self::path::Path;

use self::path::cut_mapping;

impl HandleGraph for HashGraph {
    #[inline]
    fn has_node(&self, node_id: NodeId) -> bool {
        self.graph.contains_key(&node_id)
    }

    #[inline]
    fn length(&self, handle: Handle) -> usize {
        self.get_node_unchecked(&handle.id()).sequence.len()
    }

    fn sequence(&self, handle: Handle) -> Vec<u8> {
        let seq: &[u8] = &self.get_node_unchecked(&handle.id()).sequence;
        if handle.is_reverse() {
            dna::revcomp(seq)
        } else {
            seq.into()
        }
    }

    #[inline]
    fn sequence_slice(&self, handle: Handle) -> &[u8] {
        &self.get_node_unchecked(&handle.id()).sequence
    }

    #[inline]
    fn min_node_id(&self) -> NodeId {
        self.min_id
    }

    #[inline]
    fn max_node_id(&self) -> NodeId {
        self.max_id
    }

    #[inline]
    fn node_count(&self) -> usize {
        self.graph.len()
    }

    #[inline]
    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn handle_edges_iter<'a>(
        &'a self,
        handle: Handle,
        dir: Direction,
    ) -> Box<dyn Iterator<Item = Handle> + 'a> {
        Box::new(self.neighbors(handle, dir))
    }

    fn handles_iter<'a>(&'a self) -> Box<dyn Iterator<Item = Handle> + 'a> {
        Box::new(self.graph.keys().map(|id| Handle::pack(*id, false)))
    }

    fn edges_iter<'a>(&'a self) -> Box<dyn Iterator<Item = Edge> + 'a> {
        Box::new(self.graph.iter().flat_map(|(id, node)| {
            let fwd = Handle::pack(*id, false);
            let rev = fwd.flip();
            node.right_edges
                .iter()
                .map(move |&n| (fwd, n))
                .chain(node.left_edges.iter().map(move |&n| (rev, n)))
                .filter(|&(l, r)| Edge::edge_handle(l, r) == Edge(l, r))
                .map(|(l, r)| Edge(l, r))
        }))
    }
}

impl HashGraph {
    /// Parallel node visitor. The callback must not touch the graph;
    /// collect work items and apply them sequentially afterwards.
    pub fn par_for_each_handle<F>(&self, f: F)
    where
        F: Fn(Handle) + Send + Sync,
    {
        self.graph
            .keys()
            .par_bridge()
            .for_each(|id| f(Handle::pack(*id, false)));
    }
}

impl AdditiveHandleGraph for HashGraph {
    fn append_handle(&mut self, sequence: &[u8]) -> Handle {
        assert!(!sequence.is_empty(), "Tried to add empty handle");
        let id = self.max_id + 1;
        self.create_handle(sequence, id)
            .expect("fresh id was already taken")
    }

    fn create_handle<T: Into<NodeId>>(
        &mut self,
        seq: &[u8],
        node_id: T,
    ) -> Result<Handle> {
        let id: NodeId = node_id.into();

        if id.0 == 0 {
            return Err(GraphError::invalid("node id 0 is reserved"));
        }
        if seq.is_empty() {
            return Err(GraphError::invalid(format!(
                "refusing to create node {} with an empty sequence",
                id
            )));
        }
        if self.graph.contains_key(&id) {
            return Err(GraphError::invalid(format!(
                "node {} already exists",
                id
            )));
        }

        self.graph.insert(id, Node::new(seq));
        self.max_id = std::cmp::max(self.max_id, id);
        self.min_id = std::cmp::min(self.min_id, id);
        Ok(Handle::pack(id, false))
    }

    fn create_edge(&mut self, Edge(left, right): Edge) -> Result<()> {
        if !self.graph.contains_key(&left.id()) {
            return Err(GraphError::NodeNotFound(left.id()));
        }
        if !self.graph.contains_key(&right.id()) {
            return Err(GraphError::NodeNotFound(right.id()));
        }

        if self.neighbors(left, Direction::Right).any(|h| h == right) {
            return Ok(());
        }

        let left_node = self.graph.get_mut(&left.id()).unwrap();
        if left.is_reverse() {
            left_node.left_edges.push(right);
        } else {
            left_node.right_edges.push(right);
        }

        if left != right.flip() {
            let right_node = self.graph.get_mut(&right.id()).unwrap();
            if right.is_reverse() {
                right_node.right_edges.push(left.flip());
            } else {
                right_node.left_edges.push(left.flip());
            }
        }

        self.edge_count += 1;
        Ok(())
    }

    fn create_edge_with_overlap(
        &mut self,
        edge: Edge,
        overlap: usize,
    ) -> Result<()> {
        if overlap > 0 {
            let max = std::cmp::min(
                self.get_node(&edge.0.id())
                    .ok_or_else(|| GraphError::NodeNotFound(edge.0.id()))?
                    .sequence
                    .len(),
                self.get_node(&edge.1.id())
                    .ok_or_else(|| GraphError::NodeNotFound(edge.1.id()))?
                    .sequence
                    .len(),
            );
            if overlap > max {
                return Err(GraphError::invalid(format!(
                    "overlap {} longer than the shorter incident node ({})",
                    overlap, max
                )));
            }
        }
        self.create_edge(edge)?;
        if overlap > 0 {
            self.edge_overlaps.insert(edge.canonical(), overlap);
        }
        Ok(())
    }
}

impl SubtractiveHandleGraph for HashGraph {
    fn remove_handle(&mut self, handle: Handle) -> bool {
        let id = handle.id();
        if !self.graph.contains_key(&id) {
            return false;
        }

        // detach every incident edge
        let fwd = handle.forward();
        let mut incident: FnvHashSet<Edge> = FnvHashSet::default();
        for n in self.neighbors(fwd, Direction::Right) {
            incident.insert(Edge(fwd, n).canonical());
        }
        for n in self.neighbors(fwd, Direction::Left) {
            incident.insert(Edge(n, fwd).canonical());
        }
        for edge in incident {
            self.remove_edge(edge);
        }

        // drop every mapping on this node from every path
        let affected: Vec<PathId> = self
            .get_node_unchecked(&id)
            .occurrences
            .keys()
            .copied()
            .collect();
        for path_id in affected {
            self.clear_occurrences(path_id);
            if let Some(path) = self.paths.get_mut(&path_id) {
                path.mappings.retain(|m| m.pos.id() != id);
                path.compact_ranks();
            }
            self.index_occurrences(path_id);
        }

        self.graph.remove(&id);
        true
    }

    fn remove_edge(&mut self, Edge(left, right): Edge) -> bool {
        if !self.neighbors(left, Direction::Right).any(|h| h == right) {
            return false;
        }

        let remove_one = |list: &mut Vec<Handle>, target: Handle| {
            if let Some(ix) = list.iter().position(|&h| h == target) {
                list.remove(ix);
            }
        };

        let left_node = self.graph.get_mut(&left.id()).unwrap();
        if left.is_reverse() {
            remove_one(&mut left_node.left_edges, right);
        } else {
            remove_one(&mut left_node.right_edges, right);
        }

        if left != right.flip() {
            let right_node = self.graph.get_mut(&right.id()).unwrap();
            if right.is_reverse() {
                remove_one(&mut right_node.right_edges, left.flip());
            } else {
                remove_one(&mut right_node.left_edges, left.flip());
            }
        }

        self.edge_overlaps.remove(&Edge(left, right).canonical());
        self.edge_count -= 1;
        true
    }

    fn clear_graph(&mut self) {
        *self = HashGraph::new();
    }
}

impl HashGraph {
    /// Move a mapping fragment produced by `cut_mapping` onto the
    /// node piece that now contains its span. `pieces` are
    /// `(forward start, forward end, forward handle)` in order.
    fn reassign_mapping_piece(
        part: &mut Mapping,
        node_len: usize,
        pieces: &[(usize, usize, Handle)],
    ) {
        let rev = part.pos.is_reverse();
        let from_len = part.from_len();
        let (pfs, pfe) = if rev {
            let end = node_len - part.pos.offset;
            (end - from_len, end)
        } else {
            (part.pos.offset, part.pos.offset + from_len)
        };

        let piece = pieces
            .iter()
            .find(|(s, e, _)| {
                if pfs < pfe {
                    *s <= pfs && pfe <= *e
                } else if rev {
                    // zero-width fragment anchors on the piece it
                    // points into on its own strand
                    *s < pfe && pfe <= *e
                } else {
                    *s <= pfs && pfs < *e
                }
            })
            .expect("mapping fragment fell outside every piece");

        let (start, end, fwd_handle) = *piece;
        let offset = if rev { end - pfe } else { pfs - start };
        part.pos = Pos {
            handle: if rev { fwd_handle.flip() } else { fwd_handle },
            offset,
        };
    }
}

impl MutableHandles for HashGraph {
    fn divide_handle(
        &mut self,
        handle: Handle,
        offsets: &[usize],
    ) -> Result<Vec<Handle>> {
        let id = handle.id();
        let node_len = self
            .get_node(&id)
            .ok_or(GraphError::NodeNotFound(id))?
            .sequence
            .len();

        let mut prev = 0;
        for &offset in offsets {
            if offset == 0 || offset >= node_len {
                return Err(GraphError::OffsetOutOfRange {
                    id,
                    offset,
                    len: node_len,
                });
            }
            if offset <= prev {
                return Err(GraphError::invalid(
                    "divide offsets must be strictly increasing",
                ));
            }
            prev = offset;
        }
        if offsets.is_empty() {
            return Ok(vec![handle]);
        }

        let fwd = handle.forward();

        // work on the forward strand; a reverse handle's offsets
        // mirror from the right
        let fwd_offsets: Vec<usize> = if handle.is_reverse() {
            offsets.iter().rev().map(|o| node_len - o).collect()
        } else {
            offsets.to_vec()
        };

        let sequence = self.get_node_unchecked(&id).sequence.clone();

        let mut bounds = Vec::with_capacity(fwd_offsets.len() + 2);
        bounds.push(0);
        bounds.extend_from_slice(&fwd_offsets);
        bounds.push(node_len);

        // the right-side edges move to the last piece; detach them
        // now and re-create them once the pieces exist, keeping any
        // overlap annotations
        let old_rights: Vec<(Handle, usize)> = self
            .neighbors(fwd, Direction::Right)
            .map(|r| (r, self.edge_overlap(Edge(fwd, r))))
            .collect();
        for &(r, _) in old_rights.iter() {
            self.remove_edge(Edge(fwd, r));
        }

        // the original node keeps its id and becomes the first piece
        self.get_node_mut(&id).unwrap().sequence =
            sequence[0..fwd_offsets[0]].into();

        let mut pieces: Vec<(usize, usize, Handle)> =
            vec![(0, fwd_offsets[0], fwd)];
        for window in bounds.windows(2).skip(1) {
            let (start, end) = (window[0], window[1]);
            let h = self.append_handle(&sequence[start..end]);
            pieces.push((start, end, h));
        }

        // chain the pieces together
        for window in pieces.windows(2) {
            self.create_edge(Edge(window[0].2, window[1].2))?;
        }

        let last = pieces.last().unwrap().2;
        for (r, overlap) in old_rights {
            let target = if r == fwd {
                // a cycle back into the original left side
                fwd
            } else if r == fwd.flip() {
                // an inverting edge on the original right side
                last.flip()
            } else {
                r
            };
            self.create_edge_with_overlap(Edge(last, target), overlap)?;
        }

        // split every mapping on the original node at the same
        // forward-strand offsets
        let affected: Vec<(PathId, Vec<usize>)> = self
            .get_node_unchecked(&id)
            .occurrences
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        for (path_id, mut indices) in affected {
            self.clear_occurrences(path_id);
            indices.sort_unstable();

            for &ix in indices.iter().rev() {
                let mapping =
                    self.paths.get(&path_id).unwrap().mappings[ix].clone();
                let rev = mapping.pos.is_reverse();
                let from_len = mapping.from_len();
                let (fs, fe) = if rev {
                    let end = node_len - mapping.pos.offset;
                    (end - from_len, end)
                } else {
                    (mapping.pos.offset, mapping.pos.offset + from_len)
                };

                let mut cuts: Vec<usize> = fwd_offsets
                    .iter()
                    .copied()
                    .filter(|&c| c > fs && c < fe)
                    .map(|c| if rev { fe - c } else { c - fs })
                    .collect();
                cuts.sort_unstable();

                let mut parts = if cuts.is_empty() {
                    vec![mapping]
                } else {
                    cut_mapping(&mapping, &cuts)
                };
                for part in parts.iter_mut() {
                    Self::reassign_mapping_piece(part, node_len, &pieces);
                }

                let path = self.paths.get_mut(&path_id).unwrap();
                path.mappings.splice(ix..=ix, parts);
            }

            self.paths.get_mut(&path_id).unwrap().compact_ranks();
            self.index_occurrences(path_id);
        }

        let result: Vec<Handle> = if handle.is_reverse() {
            pieces.iter().rev().map(|(_, _, h)| h.flip()).collect()
        } else {
            pieces.iter().map(|(_, _, h)| *h).collect()
        };

        Ok(result)
    }

    fn concat_handles(&mut self, handles: &[Handle]) -> Result<Handle> {
        if handles.len() < 2 {
            return Err(GraphError::invalid(
                "concat needs at least two handles",
            ));
        }
        for h in handles {
            if !self.graph.contains_key(&h.id()) {
                return Err(GraphError::NodeNotFound(h.id()));
            }
        }
        for window in handles.windows(2) {
            if !self.has_edge(window[0], window[1]) {
                return Err(GraphError::invalid(format!(
                    "{} and {} are not connected",
                    window[0], window[1]
                )));
            }
            if !self.perfect_path_neighbors(window[0], window[1]) {
                return Err(GraphError::invalid(format!(
                    "{} and {} are not perfect path neighbors",
                    window[0], window[1]
                )));
            }
        }

        let left = *handles.first().unwrap();
        let right = *handles.last().unwrap();

        let new_seq: Vec<u8> = handles
            .iter()
            .flat_map(|handle| self.sequence(*handle))
            .collect();
        let total_len = new_seq.len();

        let mut left_neighbors: FnvHashSet<Handle> = FnvHashSet::default();
        let mut right_neighbors: FnvHashSet<Handle> = FnvHashSet::default();

        let lefts: Vec<Handle> =
            self.neighbors(left, Direction::Left).collect();
        let rights: Vec<Handle> =
            self.neighbors(right, Direction::Right).collect();

        let new_handle = self.append_handle(&new_seq);

        for other in lefts {
            if other == right {
                // wrap-around cycle over the whole run
                left_neighbors.insert(new_handle);
            } else if other == left.flip() {
                left_neighbors.insert(new_handle.flip());
            } else {
                left_neighbors.insert(other);
            }
        }

        for other in rights {
            if other == left {
                // the wrap-around case again, already covered above
            } else if other == right.flip() {
                right_neighbors.insert(new_handle.flip());
            } else {
                right_neighbors.insert(other);
            }
        }

        for &other in left_neighbors.iter() {
            self.create_edge(Edge(other, new_handle))?;
        }
        for &other in right_neighbors.iter() {
            self.create_edge(Edge(new_handle, other))?;
        }

        // collapse every path run over the handles to a single
        // full-node mapping on the new node
        let visits: Vec<(PathId, Vec<usize>)> = {
            let mut per_path: FnvHashMap<PathId, Vec<usize>> =
                FnvHashMap::default();
            for (path_id, ix) in self.occurrences(left) {
                per_path.entry(path_id).or_default().push(ix);
            }
            per_path.into_iter().collect()
        };

        let run_len = handles.len();
        for (path_id, mut indices) in visits {
            self.clear_occurrences(path_id);
            indices.sort_unstable();

            // splice back to front so earlier indices stay valid
            for &ix in indices.iter().rev() {
                let path = self.paths.get_mut(&path_id).unwrap();
                let runs_reverse = path.mappings[ix].pos.handle != left;
                let (start, end) = if runs_reverse {
                    (ix + 1 - run_len, ix)
                } else {
                    (ix, ix + run_len - 1)
                };
                let oriented = if runs_reverse {
                    new_handle.flip()
                } else {
                    new_handle
                };
                let rank = path.mappings[start].rank;
                path.mappings.splice(
                    start..=end,
                    std::iter::once(Mapping::full_match(
                        oriented, total_len, rank,
                    )),
                );
            }

            self.paths.get_mut(&path_id).unwrap().compact_ranks();
            self.index_occurrences(path_id);
        }

        for &handle in handles.iter() {
            self.remove_handle(handle);
        }

        Ok(new_handle)
    }

    fn apply_orientation(&mut self, handle: Handle) -> Result<Handle> {
        if !handle.is_reverse() {
            return Ok(handle);
        }

        let id = handle.id();
        let node = self
            .graph
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound(id))?;

        node.sequence = dna::revcomp(node.sequence.as_slice());

        // every neighbor entry pointing at this node flips strand
        let targets: FnvHashSet<NodeId> = {
            let node = self.get_node_unchecked(&id);
            node.left_edges
                .iter()
                .chain(node.right_edges.iter())
                .map(|h| h.id())
                .filter(|t| *t != id)
                .collect()
        };

        for target in targets {
            let other = self.graph.get_mut(&target).unwrap();
            for entry in other
                .left_edges
                .iter_mut()
                .chain(other.right_edges.iter_mut())
            {
                if entry.id() == id {
                    *entry = entry.flip();
                }
            }
        }

        // the old left side is the new right side, and self-referring
        // entries flip along with the node
        let node = self.graph.get_mut(&id).unwrap();
        std::mem::swap(&mut node.left_edges, &mut node.right_edges);
        for entry in node
            .left_edges
            .iter_mut()
            .chain(node.right_edges.iter_mut())
        {
            if entry.id() == id {
                *entry = entry.flip();
            }
        }

        // a mapping's strand-local view of the node is unchanged when
        // both the sequence and the mapping handle flip
        let affected: Vec<(PathId, Vec<usize>)> = self
            .get_node_unchecked(&id)
            .occurrences
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (path_id, indices) in affected {
            let path = self.paths.get_mut(&path_id).unwrap();
            for ix in indices {
                let m = &mut path.mappings[ix];
                m.pos.handle = m.pos.handle.flip();
            }
        }

        Ok(handle.flip())
    }
}

impl TransformNodeIds for HashGraph {
    fn transform_node_ids<F>(&mut self, transform: F)
    where
        F: Fn(NodeId) -> NodeId + Copy + Send + Sync,
    {
        let old_graph = std::mem::take(&mut self.graph);
        let mut new_graph = FnvHashMap::with_capacity_and_hasher(
            old_graph.len(),
            Default::default(),
        );

        let mut min_id = std::u64::MAX;
        let mut max_id = 0u64;

        for (id, mut node) in old_graph {
            let new_id = transform(id);
            min_id = std::cmp::min(min_id, new_id.0);
            max_id = std::cmp::max(max_id, new_id.0);
            for entry in node
                .left_edges
                .iter_mut()
                .chain(node.right_edges.iter_mut())
            {
                *entry = Handle::pack(transform(entry.id()), entry.is_reverse());
            }
            new_graph.insert(new_id, node);
        }

        self.graph = new_graph;
        self.min_id = NodeId(min_id);
        self.max_id = NodeId(max_id);

        let old_overlaps = std::mem::take(&mut self.edge_overlaps);
        for (Edge(l, r), overlap) in old_overlaps {
            let l = Handle::pack(transform(l.id()), l.is_reverse());
            let r = Handle::pack(transform(r.id()), r.is_reverse());
            self.edge_overlaps.insert(Edge(l, r).canonical(), overlap);
        }

        for path in self.paths.values_mut() {
            for m in path.mappings.iter_mut() {
                m.pos.handle = Handle::pack(
                    transform(m.pos.id()),
                    m.pos.is_reverse(),
                );
            }
        }
    }

    fn apply_ordering(&mut self, order: &[Handle]) -> Result<()> {
        if order.len() != self.graph.len() {
            return Err(GraphError::invalid(format!(
                "ordering has {} entries for {} nodes",
                order.len(),
                self.graph.len()
            )));
        }

        for h in order {
            if h.is_reverse() {
                self.apply_orientation(*h)?;
            }
        }

        let new_ids: FnvHashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(ix, h)| (h.id(), NodeId(ix as u64 + 1)))
            .collect();

        if new_ids.len() != order.len()
            || !self.graph.keys().all(|id| new_ids.contains_key(id))
        {
            return Err(GraphError::invalid(
                "ordering must mention every node exactly once",
            ));
        }

        self.transform_node_ids(|id| new_ids[&id]);
        Ok(())
    }
}

impl PathHandleGraph for HashGraph {
    fn path_count(&self) -> usize {
        self.paths.len()
    }

    fn has_path(&self, name: &[u8]) -> bool {
        self.path_id.contains_key(name)
    }

    fn get_path_id(&self, name: &[u8]) -> Option<PathId> {
        self.path_id.get(name).copied()
    }

    fn path_name(&self, path_id: PathId) -> Option<&[u8]> {
        self.paths.get(&path_id).map(|p| p.name.as_slice())
    }

    fn path_is_circular(&self, path_id: PathId) -> Option<bool> {
        self.paths.get(&path_id).map(|p| p.is_circular)
    }

    fn set_circularity(
        &mut self,
        path_id: PathId,
        circular: bool,
    ) -> Result<()> {
        let path = self
            .paths
            .get_mut(&path_id)
            .ok_or_else(|| GraphError::PathNotFound(path_id.to_string()))?;
        path.is_circular = circular;
        Ok(())
    }

    fn create_path(
        &mut self,
        name: &[u8],
        is_circular: bool,
    ) -> Result<PathId> {
        if self.path_id.contains_key(name) {
            return Err(GraphError::invalid(format!(
                "path {:?} already exists",
                String::from_utf8_lossy(name)
            )));
        }
        let path_id = self.next_path_id;
        self.next_path_id += 1;
        self.path_id.insert(name.into(), path_id);
        self.paths
            .insert(path_id, Path::new(name, path_id, is_circular));
        Ok(path_id)
    }

    fn destroy_path(&mut self, path_id: PathId) -> Result<()> {
        if !self.paths.contains_key(&path_id) {
            return Err(GraphError::PathNotFound(path_id.to_string()));
        }
        self.clear_occurrences(path_id);
        let path = self.paths.remove(&path_id).unwrap();
        self.path_id.remove(path.name.as_slice());
        Ok(())
    }

    fn mapping_count(&self, path_id: PathId) -> usize {
        self.paths.get(&path_id).map(|p| p.len()).unwrap_or(0)
    }

    fn append_mapping(
        &mut self,
        path_id: PathId,
        mut mapping: Mapping,
    ) -> Result<usize> {
        if !self.graph.contains_key(&mapping.pos.id()) {
            return Err(GraphError::NodeNotFound(mapping.pos.id()));
        }
        let path = self
            .paths
            .get_mut(&path_id)
            .ok_or_else(|| GraphError::PathNotFound(path_id.to_string()))?;
        mapping.rank = path.next_rank();
        let node_id = mapping.pos.id();
        path.mappings.push(mapping);
        let ix = path.len() - 1;
        self.graph
            .get_mut(&node_id)
            .unwrap()
            .add_occurrence(path_id, ix);
        Ok(ix)
    }

    fn append_step(&mut self, path_id: PathId, handle: Handle) -> Result<usize> {
        let node_len = self
            .get_node(&handle.id())
            .ok_or(GraphError::NodeNotFound(handle.id()))?
            .sequence
            .len();
        self.append_mapping(path_id, Mapping::full_match(handle, node_len, 0))
    }

    fn insert_mapping(
        &mut self,
        path_id: PathId,
        index: usize,
        mapping: Mapping,
    ) -> Result<usize> {
        if !self.graph.contains_key(&mapping.pos.id()) {
            return Err(GraphError::NodeNotFound(mapping.pos.id()));
        }
        if index > self.mapping_count(path_id) {
            return Err(GraphError::invalid("insertion index past path end"));
        }
        self.clear_occurrences(path_id);
        let path = self
            .paths
            .get_mut(&path_id)
            .ok_or_else(|| GraphError::PathNotFound(path_id.to_string()))?;
        path.mappings.insert(index, mapping);
        path.compact_ranks();
        self.index_occurrences(path_id);
        Ok(index)
    }

    fn remove_mapping(
        &mut self,
        path_id: PathId,
        index: usize,
    ) -> Result<Mapping> {
        if index >= self.mapping_count(path_id) {
            return Err(GraphError::invalid("mapping index past path end"));
        }
        self.clear_occurrences(path_id);
        let path = self.paths.get_mut(&path_id).unwrap();
        let removed = path.mappings.remove(index);
        path.compact_ranks();
        self.index_occurrences(path_id);
        Ok(removed)
    }

    fn divide_mapping(
        &mut self,
        path_id: PathId,
        index: usize,
        offset: usize,
    ) -> Result<(usize, usize)> {
        if index >= self.mapping_count(path_id) {
            return Err(GraphError::invalid("mapping index past path end"));
        }
        let mapping = self.paths[&path_id].mappings[index].clone();
        if offset == 0 || offset >= mapping.from_len() {
            return Err(GraphError::invalid(format!(
                "cannot divide a {}-base mapping at {}",
                mapping.from_len(),
                offset
            )));
        }
        let parts = cut_mapping(&mapping, &[offset]);
        self.clear_occurrences(path_id);
        let path = self.paths.get_mut(&path_id).unwrap();
        path.mappings.splice(index..=index, parts);
        path.compact_ranks();
        self.index_occurrences(path_id);
        Ok((index, index + 1))
    }

    fn swap_mapping_node(
        &mut self,
        path_id: PathId,
        index: usize,
        handle: Handle,
    ) -> Result<()> {
        if index >= self.mapping_count(path_id) {
            return Err(GraphError::invalid("mapping index past path end"));
        }
        if !self.graph.contains_key(&handle.id()) {
            return Err(GraphError::NodeNotFound(handle.id()));
        }
        self.clear_occurrences(path_id);
        self.paths.get_mut(&path_id).unwrap().mappings[index].pos.handle =
            handle;
        self.index_occurrences(path_id);
        Ok(())
    }

    fn compact_ranks(&mut self, path_id: PathId) -> Result<()> {
        let path = self
            .paths
            .get_mut(&path_id)
            .ok_or_else(|| GraphError::PathNotFound(path_id.to_string()))?;
        path.compact_ranks();
        Ok(())
    }

    fn path_bases_len(&self, path_id: PathId) -> Option<usize> {
        self.paths.get(&path_id).map(|p| p.bases_len())
    }

    fn mappings_iter<'a>(
        &'a self,
        path_id: PathId,
    ) -> Box<dyn Iterator<Item = &'a Mapping> + 'a> {
        match self.paths.get(&path_id) {
            None => Box::new(std::iter::empty()),
            Some(path) => Box::new(path.mappings.iter()),
        }
    }

    fn path_ids_iter<'a>(&'a self) -> Box<dyn Iterator<Item = PathId> + 'a> {
        Box::new(self.paths.keys().copied())
    }

    fn steps_on_handle<'a>(
        &'a self,
        handle: Handle,
    ) -> Box<dyn Iterator<Item = (PathId, usize)> + 'a> {
        match self.graph.get(&handle.id()) {
            None => Box::new(std::iter::empty()),
            Some(_) => Box::new(self.occurrences(handle)),
        }
    }
}
