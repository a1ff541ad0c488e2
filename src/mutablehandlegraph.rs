/*!

Traits for manipulating the nodes and edges of a graph.

*/

use crate::error::Result;
use crate::handle::{Edge, Handle, NodeId};

/// Methods for adding handles and edges to a graph.
pub trait AdditiveHandleGraph {
    /// Add a node with the provided sequence to the graph, letting
    /// the graph pick the node ID (`max_id + 1`).
    fn append_handle(&mut self, sequence: &[u8]) -> Handle;

    /// Add a node with the provided sequence and ID to the graph.
    /// Fails if the id is zero or already taken.
    fn create_handle<T: Into<NodeId>>(
        &mut self,
        sequence: &[u8],
        node_id: T,
    ) -> Result<Handle>;

    /// Insert an edge into the graph. Idempotent: inserting an edge
    /// that already exists leaves the graph unchanged. Fails if either
    /// endpoint node does not exist.
    fn create_edge(&mut self, edge: Edge) -> Result<()>;

    /// Insert an edge carrying an overlap length, for assembly-style
    /// overlap graphs. The overlap must not exceed either incident
    /// node's sequence length.
    fn create_edge_with_overlap(
        &mut self,
        edge: Edge,
        overlap: usize,
    ) -> Result<()>;
}

/// Methods for removing handles and edges from a graph.
pub trait SubtractiveHandleGraph {
    /// Remove a node and every incident edge, returning `true` if the
    /// node existed. Every path mapping on the node is removed; the
    /// surrounding mappings remain and ranks are compacted.
    fn remove_handle(&mut self, handle: Handle) -> bool;

    /// Remove an edge from the graph, returning `true` if the edge
    /// existed.
    fn remove_edge(&mut self, edge: Edge) -> bool;

    fn clear_graph(&mut self);
}

/// Methods for restructuring handles that already exist in a graph.
pub trait MutableHandles: AdditiveHandleGraph {
    /// Divide a node at the provided offsets, in terms of the
    /// handle's local strand. Offsets must be strictly increasing and
    /// strictly inside `(0, len)`. Returns the pieces in handle
    /// order; edges and path mappings follow the pieces.
    fn divide_handle(
        &mut self,
        handle: Handle,
        offsets: &[usize],
    ) -> Result<Vec<Handle>>;

    /// Divide at a single offset. Default implementation uses
    /// `divide_handle()`.
    fn split_handle(
        &mut self,
        handle: Handle,
        offset: usize,
    ) -> Result<(Handle, Handle)> {
        let handles = self.divide_handle(handle, &[offset])?;
        Ok((handles[0], handles[1]))
    }

    /// Replace a perfect-path-neighbor run of handles with one node
    /// whose sequence is the concatenation of the run's sequences in
    /// traversal order. Paths covering the run collapse to a single
    /// mapping per visit.
    fn concat_handles(&mut self, handles: &[Handle]) -> Result<Handle>;

    /// Transform the node so the given handle's orientation becomes
    /// the node's forward orientation, rewiring incident edges and
    /// flipping path mappings. Identity on forward handles. Returns
    /// the handle reading the same sequence as the input did.
    fn apply_orientation(&mut self, handle: Handle) -> Result<Handle>;
}

/// Applying transformations to all IDs in a graph, and applying sort
/// orders.
pub trait TransformNodeIds {
    /// Reassign all node IDs using the provided mapping, which must
    /// be injective over the graph's ids.
    fn transform_node_ids<F>(&mut self, transform: F)
    where
        F: Fn(NodeId) -> NodeId + Copy + Send + Sync;

    /// Renumber the graph so `order[i]` becomes node `i + 1`, first
    /// reorienting any handle given in reverse. `order` must contain
    /// each node exactly once.
    fn apply_ordering(&mut self, order: &[Handle]) -> Result<()>;
}

/// A graph that supports all forms of handle- and edge-related
/// mutation.
///
/// Has a blanket implementation for all graphs that implement the
/// other traits in this module.
pub trait MutableHandleGraph:
    AdditiveHandleGraph + SubtractiveHandleGraph + MutableHandles + TransformNodeIds
{
}

impl<T> MutableHandleGraph for T where
    T: AdditiveHandleGraph
        + SubtractiveHandleGraph
        + MutableHandles
        + TransformNodeIds
{
}
