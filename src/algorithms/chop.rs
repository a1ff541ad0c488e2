/*!

Dicing: divide every node longer than a bound into pieces of at most
that many bases, so downstream indexing sees bounded node lengths.

*/

use crate::{
    error::Result,
    handle::{Handle, NodeId},
    handlegraph::*,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
};

#[allow(unused_imports)]
use log::{debug, info};

/// Divide every node longer than `max_len`. Edges and paths follow
/// the pieces. Returns the number of nodes divided.
pub fn chop(graph: &mut HashGraph, max_len: usize) -> Result<usize> {
    assert!(max_len > 0, "cannot chop to zero-length nodes");

    let mut todo: Vec<NodeId> = graph
        .handles_iter()
        .filter(|h| graph.length(*h) > max_len)
        .map(|h| h.id())
        .collect();
    todo.sort();

    debug!("chop: dividing {} nodes to <= {} bases", todo.len(), max_len);

    for id in todo.iter() {
        let handle = Handle::pack(*id, false);
        let len = graph.length(handle);
        let offsets: Vec<usize> =
            (1..).map(|i| i * max_len).take_while(|&o| o < len).collect();
        graph.divide_handle(handle, &offsets)?;
    }

    Ok(todo.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Edge;
    use crate::pathgraph::PathHandleGraph;

    #[test]
    fn chop_bounds_node_lengths() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGTACGTA");
        let h2 = graph.append_handle(b"GG");
        graph.create_edge(Edge(h1, h2)).unwrap();

        let path = graph.create_path(b"P", false).unwrap();
        graph.append_step(path, h1).unwrap();
        graph.append_step(path, h2).unwrap();

        let divided = chop(&mut graph, 4).unwrap();
        assert_eq!(divided, 1);

        for h in graph.handles_iter() {
            assert!(graph.length(h) <= 4);
        }

        // the path spells the original sequence over the pieces
        let spelled: Vec<u8> = graph
            .mappings_iter(path)
            .flat_map(|m| graph.sequence(m.pos.handle))
            .collect();
        assert_eq!(spelled, b"ACGTACGTAGG".to_vec());
    }
}
