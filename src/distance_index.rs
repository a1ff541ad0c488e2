/*!

The snarl distance index: the whole decomposition of a frozen graph
packed into one `u64` vector, with constant-time navigation over the
snarl tree and exact minimum-distance queries between graph
positions.

The index is an immutable snapshot; mutating the graph invalidates
it. It holds no reference to the graph — queries that need sequence
lengths or adjacency (oversized snarls, net-edge traversal) take the
graph as an argument.

*/

use std::io::{Read, Write};

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    error::{GraphError, Result},
    handle::{Handle, NodeId, Pos},
    handlegraph::HandleGraph,
    snarls::{build_snarl_tree, SnarlFinder},
};

pub mod build;
pub mod records;

pub use self::records::{
    Connectivity, Distance, Endpoint, NetHandle, NetKind,
};

use self::build::{
    side_departure, snarl_arrivals, snarl_side_dijkstra, SnarlChild,
};
use self::records::*;

#[allow(unused_imports)]
use log::{debug, info};

/// Default bound on snarl children before the pairwise matrix is
/// dropped and queries fall back to graph traversal.
pub const DEFAULT_SNARL_SIZE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnarlDistanceIndex {
    records: Vec<u64>,
}

impl SnarlDistanceIndex {
    /// Build the index for a frozen graph from a snarl decomposition.
    pub fn new<G: HandleGraph, F: SnarlFinder>(
        graph: &G,
        finder: &F,
    ) -> Result<SnarlDistanceIndex> {
        Self::with_size_limit(graph, finder, DEFAULT_SNARL_SIZE_LIMIT)
    }

    pub fn with_size_limit<G: HandleGraph, F: SnarlFinder>(
        graph: &G,
        finder: &F,
        size_limit: usize,
    ) -> Result<SnarlDistanceIndex> {
        let tree = build_snarl_tree(graph, finder)?;
        let records = build::build_records(graph, &tree, size_limit)?;
        Ok(SnarlDistanceIndex { records })
    }

    pub fn from_vec(records: Vec<u64>) -> Result<SnarlDistanceIndex> {
        if records.len() < ROOT_HEADER || records[0] != ROOT {
            return Err(GraphError::invalid(
                "record vector does not start with a root record",
            ));
        }
        if records[1] != INDEX_VERSION {
            return Err(GraphError::invalid(format!(
                "unsupported index version {}",
                records[1]
            )));
        }
        Ok(SnarlDistanceIndex { records })
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.records
    }

    /// The persisted layout: the raw record vector as little-endian
    /// 64-bit words.
    pub fn serialize<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for word in self.records.iter() {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(mut reader: R) -> Result<SnarlDistanceIndex> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| GraphError::invalid(format!("read failed: {}", e)))?;
        if bytes.len() % 8 != 0 {
            return Err(GraphError::invalid(
                "index byte length is not a multiple of 8",
            ));
        }
        let words = bytes
            .chunks_exact(8)
            .map(|c| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(c);
                u64::from_le_bytes(buf)
            })
            .collect();
        SnarlDistanceIndex::from_vec(words)
    }

    fn rec(&self) -> Records {
        Records::new(&self.records)
    }

    // ------------------------------------------------------------------
    // snarl tree navigation

    pub fn root(&self) -> NetHandle {
        NetHandle::pack(0, Connectivity::StartEnd, NetKind::Root)
    }

    pub fn is_root(&self, net: NetHandle) -> bool {
        net.offset() == 0
    }

    pub fn is_chain(&self, net: NetHandle) -> bool {
        net.kind() == NetKind::Chain
    }

    pub fn is_snarl(&self, net: NetHandle) -> bool {
        net.kind() == NetKind::Snarl
    }

    pub fn is_node(&self, net: NetHandle) -> bool {
        net.kind() == NetKind::Node || net.kind() == NetKind::Sentinel
    }

    /// A sentinel is a node standing on a chain: the boundary of the
    /// snarls to either side of it.
    pub fn is_sentinel(&self, net: NetHandle) -> bool {
        self.is_node(net)
            && !self.is_root(net)
            && self.rec().is_chain(self.rec().parent(net.offset()))
    }

    /// The net handle of a graph traversal.
    pub fn node_net(&self, handle: Handle) -> Result<NetHandle> {
        let r = self.rec();
        let offset = r
            .node_offset(handle.id())
            .ok_or(GraphError::NodeNotFound(handle.id()))?;
        let connectivity = if handle.is_reverse() {
            Connectivity::EndStart
        } else {
            Connectivity::StartEnd
        };
        let kind = if r.is_chain(r.parent(offset)) {
            NetKind::Sentinel
        } else {
            NetKind::Node
        };
        Ok(NetHandle::pack(offset, connectivity, kind))
    }

    /// The graph traversal of a node net handle.
    pub fn handle_of(&self, net: NetHandle) -> Result<Handle> {
        if !self.is_node(net) {
            return Err(GraphError::unsupported(
                "only node handles map back to graph traversals",
            ));
        }
        let r = self.rec();
        let id = r.node_id_at(net.offset());
        Ok(Handle::pack(
            id,
            net.connectivity().starts_at() == Endpoint::End,
        ))
    }

    pub fn parent(&self, net: NetHandle) -> NetHandle {
        if self.is_root(net) {
            return self.root();
        }
        let r = self.rec();
        let parent = r.parent(net.offset());
        if parent == 0 {
            return self.root();
        }
        let kind = if r.is_chain(parent) {
            NetKind::Chain
        } else {
            NetKind::Snarl
        };
        // a start-end or end-start traversal carries its direction
        // into a chain parent
        let connectivity = match (net.connectivity(), kind) {
            (Connectivity::StartEnd, NetKind::Chain) => Connectivity::StartEnd,
            (Connectivity::EndStart, NetKind::Chain) => Connectivity::EndStart,
            _ => Connectivity::StartEnd,
        };
        NetHandle::pack(parent, connectivity, kind)
    }

    /// Visit the children of a root, chain, or snarl handle in tree
    /// order. The visitor returns `false` to stop; `children`
    /// returns `false` if it did.
    pub fn children<F>(&self, net: NetHandle, mut visitor: F) -> Result<bool>
    where
        F: FnMut(NetHandle) -> bool,
    {
        let r = self.rec();
        match net.kind() {
            NetKind::Root => {
                for ix in 0..r.component_count() {
                    let offset = r.component(ix);
                    if !visitor(NetHandle::pack(
                        offset,
                        Connectivity::StartEnd,
                        NetKind::Chain,
                    )) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NetKind::Chain => {
                let offset = net.offset();
                let n = r.chain_node_count(offset);
                for i in 0..n {
                    let member = r.chain_member(offset, i);
                    let noff = r.node_offset(member.node_id).ok_or_else(
                        || GraphError::NodeNotFound(member.node_id),
                    )?;
                    if !visitor(NetHandle::pack(
                        noff,
                        Connectivity::StartEnd,
                        NetKind::Sentinel,
                    )) {
                        return Ok(false);
                    }
                    if member.snarl_slot > TRIVIAL_SNARL
                        && !visitor(NetHandle::pack(
                            member.snarl_slot as usize,
                            Connectivity::StartEnd,
                            NetKind::Snarl,
                        ))
                    {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NetKind::Snarl => {
                let offset = net.offset();
                for ix in 0..r.snarl_child_count(offset) {
                    let child = r.snarl_child(offset, ix);
                    let kind = if r.is_chain(child) {
                        NetKind::Chain
                    } else {
                        NetKind::Node
                    };
                    if !visitor(NetHandle::pack(
                        child,
                        Connectivity::StartEnd,
                        kind,
                    )) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(GraphError::unsupported(
                "node handles have no children",
            )),
        }
    }

    /// The boundary traversal of a snarl or chain, facing in or out.
    pub fn bound(
        &self,
        net: NetHandle,
        get_end: bool,
        face_in: bool,
    ) -> Result<NetHandle> {
        let r = self.rec();
        let offset = net.offset();
        let handle = match net.kind() {
            NetKind::Snarl => {
                if get_end {
                    // stored facing out of the snarl
                    let h = r.snarl_end(offset);
                    if face_in {
                        h.flip()
                    } else {
                        h
                    }
                } else {
                    let h = r.snarl_start(offset);
                    if face_in {
                        h
                    } else {
                        h.flip()
                    }
                }
            }
            NetKind::Chain => {
                if get_end {
                    let h = r.chain_end(offset);
                    if face_in {
                        h.flip()
                    } else {
                        h
                    }
                } else {
                    let h = r.chain_start(offset);
                    if face_in {
                        h
                    } else {
                        h.flip()
                    }
                }
            }
            _ => {
                return Err(GraphError::unsupported(
                    "bounds exist only on snarls and chains",
                ))
            }
        };
        self.node_net(handle)
    }

    pub fn flip(&self, net: NetHandle) -> NetHandle {
        net.with_connectivity(net.connectivity().flipped())
    }

    pub fn canonical(&self, net: NetHandle) -> NetHandle {
        net.with_connectivity(Connectivity::StartEnd)
    }

    pub fn starts_at(&self, net: NetHandle) -> Endpoint {
        net.connectivity().starts_at()
    }

    pub fn ends_at(&self, net: NetHandle) -> Endpoint {
        net.connectivity().ends_at()
    }

    /// Minimum length through a node, chain, or snarl record.
    pub fn min_length(&self, net: NetHandle) -> Result<Distance> {
        let r = self.rec();
        match net.kind() {
            NetKind::Node | NetKind::Sentinel => {
                Ok(Distance::Reachable(r.node_length(net.offset())))
            }
            NetKind::Chain => Ok(r.chain_min_length(net.offset())),
            NetKind::Snarl => Ok(r.snarl_min_length(net.offset())),
            NetKind::Root => {
                Err(GraphError::unsupported("the root has no length"))
            }
        }
    }

    pub fn max_length(&self, net: NetHandle) -> Result<Distance> {
        let r = self.rec();
        match net.kind() {
            NetKind::Node | NetKind::Sentinel => {
                Ok(Distance::Reachable(r.node_length(net.offset())))
            }
            NetKind::Chain => Ok(r.chain_max_length(net.offset())),
            NetKind::Snarl => Ok(r.snarl_max_length(net.offset())),
            NetKind::Root => {
                Err(GraphError::unsupported("the root has no length"))
            }
        }
    }

    /// Number of child ranks of a snarl, boundary nodes included.
    pub fn node_count(&self, net: NetHandle) -> Result<usize> {
        if !self.is_snarl(net) {
            return Err(GraphError::unsupported(
                "node counts are recorded on snarls",
            ));
        }
        Ok(self.rec().snarl_node_count(net.offset()))
    }

    /// Move along the underlying graph between siblings in the snarl
    /// tree: from a chain member to the adjacent member or snarl, or
    /// from a snarl child across the snarl interior.
    pub fn follow_net_edges<G, F>(
        &self,
        net: NetHandle,
        graph: &G,
        go_left: bool,
        mut visitor: F,
    ) -> Result<bool>
    where
        G: HandleGraph,
        F: FnMut(NetHandle) -> bool,
    {
        let r = self.rec();
        let parent = r.parent(net.offset());
        if parent == 0 {
            return Ok(true);
        }

        if r.is_chain(parent) {
            // walk the chain record itself
            let rank = r.rank_in_parent(net.offset());
            let n = r.chain_node_count(parent);
            let next: Option<NetHandle> = match net.kind() {
                NetKind::Node | NetKind::Sentinel => {
                    if go_left {
                        if rank == 0 {
                            None
                        } else {
                            let member = r.chain_member(parent, rank - 1);
                            self.chain_slot_net(parent, rank - 1, member)
                        }
                    } else if rank + 1 >= n {
                        None
                    } else {
                        let member = r.chain_member(parent, rank);
                        match member.snarl_slot {
                            0 => None,
                            TRIVIAL_SNARL => {
                                self.member_net(parent, rank + 1)
                            }
                            slot => Some(NetHandle::pack(
                                slot as usize,
                                Connectivity::StartEnd,
                                NetKind::Snarl,
                            )),
                        }
                    }
                }
                NetKind::Snarl => {
                    let ix = r.rank_in_parent(net.offset());
                    if go_left {
                        self.member_net(parent, ix)
                    } else {
                        self.member_net(parent, ix + 1)
                    }
                }
                _ => None,
            };
            if let Some(next) = next {
                return Ok(visitor(next));
            }
            return Ok(true);
        }

        // the sibling graph inside a snarl: leave the child through
        // its boundary and resolve each neighbor to a sibling or a
        // snarl bound
        let start = r.snarl_start(parent);
        let end = r.snarl_end(parent);
        let out_handle: Handle = match net.kind() {
            NetKind::Node => {
                let h = self.handle_of(net)?;
                if go_left {
                    h.flip()
                } else {
                    h
                }
            }
            NetKind::Chain => {
                if go_left {
                    r.chain_start(net.offset()).flip()
                } else {
                    r.chain_end(net.offset())
                }
            }
            _ => {
                return Err(GraphError::unsupported(
                    "net edges are followed from nodes and chains",
                ))
            }
        };

        let mut keep_going = true;
        graph.follow_edges(
            out_handle,
            crate::handle::Direction::Right,
            |n| {
                let target = if n.id() == start.id() || n.id() == end.id() {
                    self.node_net(n).ok()
                } else {
                    self.sibling_net(parent, n)
                };
                match target {
                    Some(t) => {
                        keep_going = visitor(t);
                        keep_going
                    }
                    None => true,
                }
            },
        );
        Ok(keep_going)
    }

    /// The traversal of the parent that runs from one child bound to
    /// another: both arguments must be node handles on the same
    /// chain, bounding a single snarl or the chain itself.
    pub fn parent_traversal(
        &self,
        start: NetHandle,
        end: NetHandle,
    ) -> Result<NetHandle> {
        let r = self.rec();
        if !self.is_node(start) || !self.is_node(end) {
            return Err(GraphError::unsupported(
                "parent traversals run between node bounds",
            ));
        }
        let ps = r.parent(start.offset());
        let pe = r.parent(end.offset());
        if ps != pe {
            return Err(GraphError::invalid(
                "parent traversal of two non-siblings",
            ));
        }
        if !r.is_chain(ps) {
            return Err(GraphError::invalid(
                "parent traversal bounds must stand on a chain",
            ));
        }
        let i = r.rank_in_parent(start.offset());
        let j = r.rank_in_parent(end.offset());
        if i == j {
            return Err(GraphError::invalid(
                "parent traversal needs two distinct bounds",
            ));
        }
        let (lo, hi, connectivity) = if i < j {
            (i, j, Connectivity::StartEnd)
        } else {
            (j, i, Connectivity::EndStart)
        };
        if hi == lo + 1 {
            let member = r.chain_member(ps, lo);
            if member.snarl_slot > TRIVIAL_SNARL {
                return Ok(NetHandle::pack(
                    member.snarl_slot as usize,
                    connectivity,
                    NetKind::Snarl,
                ));
            }
        }
        // spanning more than one slot: the traversal is the chain
        Ok(NetHandle::pack(ps, connectivity, NetKind::Chain))
    }

    fn member_net(&self, chain: usize, ix: usize) -> Option<NetHandle> {
        let r = self.rec();
        if ix >= r.chain_node_count(chain) {
            return None;
        }
        let member = r.chain_member(chain, ix);
        let noff = r.node_offset(member.node_id)?;
        Some(NetHandle::pack(
            noff,
            Connectivity::StartEnd,
            NetKind::Sentinel,
        ))
    }

    fn chain_slot_net(
        &self,
        chain: usize,
        ix: usize,
        member: ChainMember,
    ) -> Option<NetHandle> {
        match member.snarl_slot {
            0 | TRIVIAL_SNARL => self.member_net(chain, ix),
            slot => Some(NetHandle::pack(
                slot as usize,
                Connectivity::StartEnd,
                NetKind::Snarl,
            )),
        }
    }

    /// The sibling (direct child of `snarl`) a traversal lands on,
    /// oriented by the side it was entered through.
    fn sibling_net(&self, snarl: usize, entered: Handle) -> Option<NetHandle> {
        let r = self.rec();
        let mut offset = r.node_offset(entered.id())?;
        // climb until the direct child of this snarl
        loop {
            let parent = r.parent(offset);
            if parent == snarl {
                break;
            }
            if parent == 0 {
                return None;
            }
            offset = parent;
        }
        if r.is_chain(offset) {
            let forward = entered == r.chain_start(offset);
            Some(NetHandle::pack(
                offset,
                if forward {
                    Connectivity::StartEnd
                } else {
                    Connectivity::EndStart
                },
                NetKind::Chain,
            ))
        } else {
            Some(NetHandle::pack(
                offset,
                if entered.is_reverse() {
                    Connectivity::EndStart
                } else {
                    Connectivity::StartEnd
                },
                NetKind::Node,
            ))
        }
    }

    // ------------------------------------------------------------------
    // distance queries

    /// Exact minimum walk length from position `a` to position `b`,
    /// counting the bases from `a`'s base (inclusive) to `b`'s base
    /// (exclusive), respecting orientation.
    pub fn min_distance<G: HandleGraph>(
        &self,
        graph: &G,
        a: Pos,
        b: Pos,
    ) -> Result<Distance> {
        let r = self.rec();

        let b_off = r
            .node_offset(b.id())
            .ok_or(GraphError::NodeNotFound(b.id()))?;
        let b_len = r.node_length(b_off) as usize;
        if b.offset >= b_len {
            return Err(GraphError::OffsetOutOfRange {
                id: b.id(),
                offset: b.offset,
                len: b_len,
            });
        }

        let mut best = if a.handle == b.handle && b.offset >= a.offset {
            Distance::Reachable((b.offset - a.offset) as u64)
        } else {
            Distance::Unreachable
        };

        let climb_a = self.climb(graph, a)?;
        let climb_b = self.climb(graph, b.reverse(b_len))?;

        let records_b: FnvHashMap<usize, usize> = climb_b
            .iter()
            .enumerate()
            .map(|(ix, level)| (level.record, ix))
            .collect();

        let lca = climb_a
            .iter()
            .enumerate()
            .find_map(|(ia, level)| {
                records_b.get(&level.record).map(|&ib| (ia, ib))
            });

        if let Some((ia, ib)) = lca {
            let level_a = &climb_a[ia];
            let level_b = &climb_b[ib];
            let combined = match (&level_a.states, &level_b.states) {
                (LevelStates::Chain(sa), LevelStates::Chain(sb)) => {
                    self.combine_chain(level_a.record, sa, sb)
                }
                (
                    LevelStates::Snarl(ra, al, ar),
                    LevelStates::Snarl(rb, bl, br),
                ) => self.combine_snarl(
                    graph,
                    level_a.record,
                    (*ra, *al, *ar),
                    (*rb, *bl, *br),
                ),
                _ => {
                    return Err(GraphError::invariant(
                        "mismatched ancestor levels in distance query",
                    ))
                }
            };
            // both climbs count their own position's base; the walk
            // excludes the target base
            best = best.min(combined.sub_bases(1));
        }

        Ok(best)
    }

    fn climb<G: HandleGraph>(
        &self,
        graph: &G,
        pos: Pos,
    ) -> Result<Vec<ClimbLevel>> {
        let r = self.rec();
        let node_off = r
            .node_offset(pos.id())
            .ok_or(GraphError::NodeNotFound(pos.id()))?;
        let len = r.node_length(node_off);
        if pos.offset as u64 >= len {
            return Err(GraphError::OffsetOutOfRange {
                id: pos.id(),
                offset: pos.offset,
                len: len as usize,
            });
        }

        let exit = Distance::Reachable(len - pos.offset as u64);
        let (mut d_left, mut d_right) = if pos.is_reverse() {
            (exit, Distance::Unreachable)
        } else {
            (Distance::Unreachable, exit)
        };

        let mut levels: Vec<ClimbLevel> = Vec::new();
        let mut child = node_off;

        loop {
            let parent = r.parent(child);
            if parent == 0 {
                break;
            }

            if r.is_chain(parent) {
                let states = if r.is_node(child) {
                    let i = r.rank_in_parent(child);
                    let (ol, or) = if r.node_reversed(child) {
                        (d_right, d_left)
                    } else {
                        (d_left, d_right)
                    };
                    vec![ChainState {
                        member: i,
                        out_left: ol,
                        out_right: or,
                        in_left: Distance::Unreachable,
                        in_right: Distance::Unreachable,
                    }]
                } else {
                    // a snarl between members i and i+1: d_left and
                    // d_right are the exits through its two bounds
                    let i = r.rank_in_parent(child);
                    let len_i = self.member_len(parent, i);
                    let len_i1 = self.member_len(parent, i + 1);
                    vec![
                        ChainState {
                            member: i,
                            out_left: d_left.add_bases(len_i),
                            out_right: Distance::Unreachable,
                            in_left: Distance::Unreachable,
                            in_right: d_left,
                        },
                        ChainState {
                            member: i + 1,
                            out_left: Distance::Unreachable,
                            out_right: d_right.add_bases(len_i1),
                            in_left: d_right,
                            in_right: Distance::Unreachable,
                        },
                    ]
                };

                let (dl, dr) = self.chain_exit(parent, &states);
                levels.push(ClimbLevel {
                    record: parent,
                    states: LevelStates::Chain(states),
                });
                d_left = dl;
                d_right = dr;
            } else {
                let rank = r.rank_in_parent(child);
                levels.push(ClimbLevel {
                    record: parent,
                    states: LevelStates::Snarl(rank, d_left, d_right),
                });
                let (dl, dr) =
                    self.snarl_exit(graph, parent, rank, d_left, d_right);
                d_left = dl;
                d_right = dr;
            }

            child = parent;
        }

        Ok(levels)
    }

    fn member_len(&self, chain: usize, ix: usize) -> u64 {
        let r = self.rec();
        let member = r.chain_member(chain, ix);
        match r.node_offset(member.node_id) {
            Some(noff) => r.node_length(noff),
            None => 0,
        }
    }

    /// Distances from a set of chain states out through the chain's
    /// two outer faces.
    fn chain_exit(
        &self,
        chain: usize,
        states: &[ChainState],
    ) -> (Distance, Distance) {
        let r = self.rec();
        let chain_min = r.chain_min_length(chain);

        let mut d_left = Distance::Unreachable;
        let mut d_right = Distance::Unreachable;

        for state in states {
            let m = r.chain_member(chain, state.member);
            let len = self.member_len(chain, state.member);
            let suffix = chain_min.sub(m.prefix_sum).sub_bases(len);

            let out_left_eff = state.out_left.min(
                state
                    .out_right
                    .add(m.forward_loop)
                    .add_bases(len),
            );
            let out_right_eff = state.out_right.min(
                state
                    .out_left
                    .add(m.backward_loop)
                    .add_bases(len),
            );

            d_left = d_left.min(out_left_eff.add(m.prefix_sum));
            d_right = d_right.min(out_right_eff.add(suffix));
        }

        (d_left, d_right)
    }

    /// Distances from one snarl child's two sides out through the
    /// snarl's bounds.
    fn snarl_exit<G: HandleGraph>(
        &self,
        graph: &G,
        snarl: usize,
        rank: usize,
        d_left: Distance,
        d_right: Distance,
    ) -> (Distance, Distance) {
        let r = self.rec();
        let c = r.snarl_child_count(snarl);
        let mut matrix = SnarlMatrix::new(snarl);

        let start = start_bound_side();
        let end = end_bound_side(c);
        let l = side_left(rank);
        let rt = side_right(rank);

        let d_start = d_left
            .add(matrix.get(self, graph, l, start))
            .min(d_right.add(matrix.get(self, graph, rt, start)));
        let d_end = d_left
            .add(matrix.get(self, graph, l, end))
            .min(d_right.add(matrix.get(self, graph, rt, end)));

        (d_start, d_end)
    }

    fn combine_chain(
        &self,
        chain: usize,
        sa: &[ChainState],
        sb: &[ChainState],
    ) -> Distance {
        let r = self.rec();
        let mut best = Distance::Unreachable;

        for a in sa {
            for b in sb {
                let (i, j) = (a.member, b.member);
                let ma = r.chain_member(chain, i);
                let mb = r.chain_member(chain, j);
                let len_i = self.member_len(chain, i);
                let len_j = self.member_len(chain, j);

                let a_right_eff = a.out_right.min(
                    a.out_left.add(ma.backward_loop).add_bases(len_i),
                );
                let a_left_eff = a.out_left.min(
                    a.out_right.add(ma.forward_loop).add_bases(len_i),
                );
                let b_right_eff = b.out_right.min(
                    b.out_left.add(mb.backward_loop).add_bases(len_j),
                );
                let b_left_eff = b.out_left.min(
                    b.out_right.add(mb.forward_loop).add_bases(len_j),
                );

                if i < j {
                    let gap =
                        mb.prefix_sum.sub(ma.prefix_sum).sub_bases(len_i);
                    best = best.min(a_right_eff.add(gap).add(b_left_eff));
                } else if i > j {
                    let gap =
                        ma.prefix_sum.sub(mb.prefix_sum).sub_bases(len_j);
                    best = best.min(a_left_eff.add(gap).add(b_right_eff));
                } else {
                    // meetings on the member's two faces
                    best = best
                        .min(a.in_right.add(b_right_eff))
                        .min(a.in_left.add(b_left_eff))
                        .min(a_right_eff.add(b.in_right))
                        .min(a_left_eff.add(b.in_left));
                    // meetings around the loops
                    best = best
                        .min(a.out_right.add(ma.forward_loop).add(b.out_right))
                        .min(a.out_left.add(ma.backward_loop).add(b.out_left))
                        .min(
                            a.out_right
                                .add(ma.forward_loop)
                                .add_bases(len_i)
                                .add(ma.backward_loop)
                                .add(b.out_left),
                        )
                        .min(
                            a.out_left
                                .add(ma.backward_loop)
                                .add_bases(len_i)
                                .add(ma.forward_loop)
                                .add(b.out_right),
                        );
                }
            }
        }

        best
    }

    fn combine_snarl<G: HandleGraph>(
        &self,
        graph: &G,
        snarl: usize,
        (ra, al, ar): (usize, Distance, Distance),
        (rb, bl, br): (usize, Distance, Distance),
    ) -> Distance {
        let mut matrix = SnarlMatrix::new(snarl);

        let sides_a = [(side_left(ra), al), (side_right(ra), ar)];
        let sides_b = [(side_left(rb), bl), (side_right(rb), br)];

        let mut best = Distance::Unreachable;
        for &(s, da) in sides_a.iter() {
            for &(t, db) in sides_b.iter() {
                best = best
                    .min(da.add(matrix.get(self, graph, s, t)).add(db));
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
enum LevelStates {
    Chain(Vec<ChainState>),
    Snarl(usize, Distance, Distance),
}

#[derive(Debug, Clone)]
struct ClimbLevel {
    record: usize,
    states: LevelStates,
}

/// A position's footprint on one chain member: walk lengths up to
/// crossing the member's faces, outward (leaving the member region)
/// or inward (arriving at the face from the surrounding snarl).
#[derive(Debug, Clone, Copy)]
struct ChainState {
    member: usize,
    out_left: Distance,
    out_right: Distance,
    in_left: Distance,
    in_right: Distance,
}

/// Side-to-side distance access for one snarl: matrix reads on
/// distanced records, on-the-fly relaxation rows on oversized ones.
struct SnarlMatrix {
    snarl: usize,
    rows: FnvHashMap<usize, Vec<Distance>>,
}

impl SnarlMatrix {
    fn new(snarl: usize) -> SnarlMatrix {
        SnarlMatrix {
            snarl,
            rows: FnvHashMap::default(),
        }
    }

    fn get<G: HandleGraph>(
        &mut self,
        index: &SnarlDistanceIndex,
        graph: &G,
        side_a: usize,
        side_b: usize,
    ) -> Distance {
        let r = index.rec();
        if r.tag(self.snarl) == DISTANCED_SNARL {
            return r.snarl_distance(self.snarl, side_a, side_b);
        }

        // oversized: rebuild the side tables and relax over the graph
        if !self.rows.contains_key(&side_a) {
            let start = r.snarl_start(self.snarl);
            let end = r.snarl_end(self.snarl);
            let c = r.snarl_child_count(self.snarl);
            let sides = 2 * (c + 2);

            let children: Vec<SnarlChild> = (0..c)
                .map(|ix| {
                    let child = r.snarl_child(self.snarl, ix);
                    if r.is_chain(child) {
                        SnarlChild::chain(
                            ix,
                            r.chain_start(child),
                            r.chain_end(child),
                        )
                    } else {
                        SnarlChild::node(r.node_id_at(child))
                    }
                })
                .collect();

            let arrivals = snarl_arrivals(start, end, &children);
            let mut boundary: FnvHashSet<NodeId> = FnvHashSet::default();
            boundary.insert(start.id());
            boundary.insert(end.id());

            let row = match side_departure(start, end, &children, side_a) {
                Some(source) => snarl_side_dijkstra(
                    graph, source, &arrivals, &boundary, sides,
                ),
                None => vec![Distance::Unreachable; sides],
            };
            self.rows.insert(side_a, row);
        }

        self.rows[&side_a][side_b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Edge;
    use crate::hashgraph::HashGraph;
    use crate::mutablehandlegraph::*;
    use crate::snarls::{bubble_decomposition, StoredDecomposition};

    fn hnd(x: u64) -> Handle {
        Handle::pack(x, false)
    }

    fn two_node_graph() -> (HashGraph, StoredDecomposition) {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGT");
        let h2 = graph.append_handle(b"GGGA");
        graph.create_edge(Edge(h1, h2)).unwrap();

        let finder = StoredDecomposition::new()
            .chain_start(h1)
            .snarl_start(h1)
            .snarl_end(h2)
            .chain_end(h2);

        (graph, finder)
    }

    fn bubble_graph() -> (HashGraph, StoredDecomposition) {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"A");
        let h2 = graph.append_handle(b"C");
        let h3 = graph.append_handle(b"G");
        let h4 = graph.append_handle(b"T");
        graph.create_edge(Edge(h1, h2)).unwrap();
        graph.create_edge(Edge(h1, h3)).unwrap();
        graph.create_edge(Edge(h2, h4)).unwrap();
        graph.create_edge(Edge(h3, h4)).unwrap();

        let finder = bubble_decomposition(hnd(1), &[hnd(2), hnd(3)], hnd(4));
        (graph, finder)
    }

    #[test]
    fn two_node_distance() {
        let (graph, finder) = two_node_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        let d = index
            .min_distance(
                &graph,
                Pos::new(1u64, 0, false),
                Pos::new(2u64, 2, false),
            )
            .unwrap();
        assert_eq!(d, Distance::Reachable(6));
    }

    #[test]
    fn bubble_snarl_annotations() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        // find the snarl under the root chain
        let mut snarl = None;
        index
            .children(index.root(), |chain| {
                index
                    .children(chain, |child| {
                        if index.is_snarl(child) {
                            snarl = Some(child);
                        }
                        true
                    })
                    .unwrap();
                true
            })
            .unwrap();
        let snarl = snarl.expect("bubble should contain a snarl");

        assert_eq!(index.node_count(snarl).unwrap(), 4);
        assert_eq!(index.min_length(snarl).unwrap(), Distance::Reachable(3));
        assert_eq!(index.max_length(snarl).unwrap(), Distance::Reachable(3));

        let start = index.bound(snarl, false, true).unwrap();
        assert_eq!(index.handle_of(start).unwrap(), hnd(1));
        let end = index.bound(snarl, true, false).unwrap();
        assert_eq!(index.handle_of(end).unwrap(), hnd(4));
    }

    #[test]
    fn bubble_distances() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        let d = |a: Pos, b: Pos| index.min_distance(&graph, a, b).unwrap();

        assert_eq!(
            d(Pos::new(1u64, 0, false), Pos::new(4u64, 0, false)),
            Distance::Reachable(2)
        );
        assert_eq!(
            d(Pos::new(2u64, 0, false), Pos::new(4u64, 0, false)),
            Distance::Reachable(1)
        );
        assert_eq!(
            d(Pos::new(1u64, 0, false), Pos::new(2u64, 0, false)),
            Distance::Reachable(1)
        );
        // the two arms never reach each other
        assert_eq!(
            d(Pos::new(2u64, 0, false), Pos::new(3u64, 0, false)),
            Distance::Unreachable
        );
        // walking backward out of the bubble is impossible
        assert_eq!(
            d(Pos::new(4u64, 0, false), Pos::new(1u64, 0, false)),
            Distance::Unreachable
        );
    }

    #[test]
    fn distance_to_self_is_zero() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        for id in 1u64..=4 {
            for &rev in [false, true].iter() {
                let p = Pos::new(id, 0, rev);
                assert_eq!(
                    index.min_distance(&graph, p, p).unwrap(),
                    Distance::Reachable(0)
                );
            }
        }
    }

    #[test]
    fn distance_is_reverse_symmetric() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();
        let g = &graph;

        let positions: Vec<Pos> = (1u64..=4)
            .flat_map(|id| {
                vec![Pos::new(id, 0, false), Pos::new(id, 0, true)]
            })
            .collect();

        for &a in positions.iter() {
            for &b in positions.iter() {
                let forward = index.min_distance(g, a, b).unwrap();
                let len_a = g.length(a.handle);
                let len_b = g.length(b.handle);
                let backward = index
                    .min_distance(g, b.reverse(len_b), a.reverse(len_a))
                    .unwrap();
                assert_eq!(forward, backward, "{} -> {}", a, b);
            }
        }
    }

    #[test]
    fn serialization_round_trip() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        let mut bytes = Vec::new();
        index.serialize(&mut bytes).unwrap();
        assert_eq!(bytes.len() % 8, 0);

        let back = SnarlDistanceIndex::deserialize(&bytes[..]).unwrap();
        assert_eq!(index.as_slice(), back.as_slice());

        let d = back
            .min_distance(
                &graph,
                Pos::new(1u64, 0, false),
                Pos::new(4u64, 0, false),
            )
            .unwrap();
        assert_eq!(d, Distance::Reachable(2));
    }

    #[test]
    fn navigation_over_the_tree() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        let root = index.root();
        assert!(index.is_root(root));

        let mut chains = Vec::new();
        index
            .children(root, |c| {
                chains.push(c);
                true
            })
            .unwrap();
        assert_eq!(chains.len(), 1);
        let top = chains[0];
        assert!(index.is_chain(top));
        assert!(index.is_root(index.parent(top)));

        let net1 = index.node_net(hnd(1)).unwrap();
        assert!(index.is_sentinel(net1));
        assert_eq!(index.parent(net1).offset(), top.offset());

        let net2 = index.node_net(hnd(2)).unwrap();
        let parent2 = index.parent(net2);
        assert!(index.is_chain(parent2));

        let flipped = index.flip(net1);
        assert_eq!(
            index.handle_of(flipped).unwrap(),
            hnd(1).flip()
        );
        assert_eq!(index.canonical(flipped), net1);
        assert_eq!(index.starts_at(flipped), Endpoint::End);
        assert_eq!(index.ends_at(flipped), Endpoint::Start);
    }

    #[test]
    fn parent_traversal_finds_the_snarl() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        let net1 = index.node_net(hnd(1)).unwrap();
        let net4 = index.node_net(hnd(4)).unwrap();
        let traversal = index.parent_traversal(net1, net4).unwrap();
        assert!(index.is_snarl(traversal));
        assert_eq!(
            index.starts_at(traversal),
            Endpoint::Start
        );
    }

    #[test]
    fn oversized_snarls_answer_the_same() {
        let (graph, finder) = bubble_graph();
        let packed = SnarlDistanceIndex::new(&graph, &finder).unwrap();
        // force every snarl into the oversized representation
        let oversized =
            SnarlDistanceIndex::with_size_limit(&graph, &finder, 0).unwrap();

        for a in 1u64..=4 {
            for b in 1u64..=4 {
                let pa = Pos::new(a, 0, false);
                let pb = Pos::new(b, 0, false);
                assert_eq!(
                    packed.min_distance(&graph, pa, pb).unwrap(),
                    oversized.min_distance(&graph, pa, pb).unwrap(),
                    "{} -> {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn net_edges_walk_the_bubble() {
        let (graph, finder) = bubble_graph();
        let index = SnarlDistanceIndex::new(&graph, &finder).unwrap();

        // from node 1 (a chain member), the next thing rightward on
        // the chain is the snarl
        let net1 = index.node_net(hnd(1)).unwrap();
        let mut nexts = Vec::new();
        index
            .follow_net_edges(net1, &graph, false, |n| {
                nexts.push(n);
                true
            })
            .unwrap();
        assert_eq!(nexts.len(), 1);
        assert!(index.is_snarl(nexts[0]));

        // from the interior chain around node 2, both directions
        // reach the snarl's bounds
        let net2 = index.node_net(hnd(2)).unwrap();
        let chain2 = index.parent(net2);
        let mut rights = Vec::new();
        index
            .follow_net_edges(chain2, &graph, false, |n| {
                rights.push(n);
                true
            })
            .unwrap();
        assert_eq!(rights.len(), 1);
        assert_eq!(index.handle_of(rights[0]).unwrap(), hnd(4));
    }
}
