use vargraph::{
    handle::{Direction, Edge, Handle, NodeId},
    handlegraph::HandleGraph,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
    pathgraph::PathHandleGraph,
    util::validate::validate,
};

fn hnd(x: u64) -> Handle {
    Handle::pack(x, false)
}

fn path_graph() -> HashGraph {
    let mut graph = HashGraph::new();
    for id in 1u64..=6 {
        graph
            .create_handle(id.to_string().as_bytes(), id)
            .unwrap();
    }

    /*
    edges
    1  -> 2 -> 5 -> 6
      \-> 3 -> 4 /
     */
    graph.create_edge(Edge(hnd(1), hnd(2))).unwrap();
    graph.create_edge(Edge(hnd(2), hnd(5))).unwrap();
    graph.create_edge(Edge(hnd(5), hnd(6))).unwrap();

    graph.create_edge(Edge(hnd(1), hnd(3))).unwrap();
    graph.create_edge(Edge(hnd(3), hnd(4))).unwrap();
    graph.create_edge(Edge(hnd(4), hnd(6))).unwrap();

    graph
}

#[test]
fn can_create_handles() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"CAAATAAG");
    let h2 = graph.append_handle(b"A");
    let h3 = graph.append_handle(b"G");

    assert_eq!(h1.id(), NodeId(1));
    assert_eq!(h3.id(), NodeId(3));

    assert_eq!(graph.sequence_slice(h1), b"CAAATAAG");
    assert_eq!(graph.sequence_slice(h2), b"A");
    assert_eq!(graph.sequence_slice(h3), b"G");

    assert_eq!(graph.min_node_id(), NodeId(1));
    assert_eq!(graph.max_node_id(), NodeId(3));
}

#[test]
fn can_create_edges_with_reciprocals() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"CAAATAAG");
    let h2 = graph.append_handle(b"A");
    let h3 = graph.append_handle(b"G");
    let h4 = graph.append_handle(b"TTG");

    graph.create_edge(Edge(h1, h2)).unwrap();
    graph.create_edge(Edge(h1, h3)).unwrap();
    graph.create_edge(Edge(h2, h4)).unwrap();
    graph.create_edge(Edge(h3, h4)).unwrap();

    assert!(graph.has_edge(h1, h2));
    assert!(graph.has_edge(h2.flip(), h1.flip()));
    assert!(graph.has_edge(h3, h4));
    assert!(graph.has_edge(h4.flip(), h3.flip()));

    assert_eq!(graph.edge_count(), 4);
    validate(&graph).unwrap();
}

#[test]
fn degrees_and_neighbors() {
    let graph = path_graph();

    assert_eq!(graph.degree(hnd(1), Direction::Right), 2);
    assert_eq!(graph.degree(hnd(1), Direction::Left), 0);
    assert_eq!(graph.degree(hnd(6), Direction::Left), 2);

    let rights: Vec<NodeId> = graph
        .handle_edges_iter(hnd(1), Direction::Right)
        .map(|h| h.id())
        .collect();
    assert!(rights.contains(&NodeId(2)));
    assert!(rights.contains(&NodeId(3)));

    // walking left from a reverse handle mirrors walking right
    // from the forward one
    let lefts: Vec<Handle> = graph
        .handle_edges_iter(hnd(1).flip(), Direction::Left)
        .collect();
    assert_eq!(lefts.len(), 2);
    assert!(lefts.iter().all(|h| h.is_reverse()));
}

#[test]
fn edges_iter_is_canonical_and_complete() {
    let graph = path_graph();

    let edges: Vec<Edge> = graph.edges_iter().collect();
    assert_eq!(edges.len(), 6);
    assert_eq!(edges.len(), graph.edge_count());

    for edge in edges.iter() {
        assert_eq!(edge.canonical(), *edge);
    }
}

#[test]
fn paths_spell_their_sequences() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"CAAATAAG");
    let h2 = graph.append_handle(b"A");
    let h3 = graph.append_handle(b"G");
    let h4 = graph.append_handle(b"TTG");
    graph.create_edge(Edge(h1, h2)).unwrap();
    graph.create_edge(Edge(h1, h3)).unwrap();
    graph.create_edge(Edge(h2, h4)).unwrap();
    graph.create_edge(Edge(h3, h4)).unwrap();

    let p1 = graph.create_path(b"left", false).unwrap();
    for h in [h1, h2, h4].iter() {
        graph.append_step(p1, *h).unwrap();
    }
    let p2 = graph.create_path(b"right", false).unwrap();
    for h in [h1, h3, h4].iter() {
        graph.append_step(p2, *h).unwrap();
    }

    assert_eq!(graph.path_count(), 2);
    assert_eq!(graph.get_path_id(b"left"), Some(p1));
    assert_eq!(graph.path_bases_len(p1), Some(12));

    let spell = |path| -> Vec<u8> {
        graph
            .mappings_iter(path)
            .flat_map(|m| graph.sequence(m.pos.handle))
            .collect()
    };
    assert_eq!(spell(p1), b"CAAATAAGATTG".to_vec());
    assert_eq!(spell(p2), b"CAAATAAGGTTG".to_vec());

    // both paths occur on the shared nodes
    let on_h1: Vec<_> = graph.steps_on_handle(h1).collect();
    assert_eq!(on_h1.len(), 2);

    validate(&graph).unwrap();
}

// After divide_handle then concat_handles on a node with no other
// references, the graph is isomorphic to the original and path
// sequences are bit-identical.
#[test]
fn divide_then_concat_restores_the_graph() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"AAAACCCC");
    let p = graph.create_path(b"P", false).unwrap();
    graph.append_step(p, h1).unwrap();

    let before_seq: Vec<u8> = graph
        .mappings_iter(p)
        .flat_map(|m| graph.sequence(m.pos.handle))
        .collect();

    let parts = graph.divide_handle(h1, &[4]).unwrap();
    validate(&graph).unwrap();
    assert_eq!(graph.node_count(), 2);

    let merged = graph.concat_handles(&parts).unwrap();
    validate(&graph).unwrap();

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.sequence(merged), b"AAAACCCC".to_vec());

    let after_seq: Vec<u8> = graph
        .mappings_iter(p)
        .flat_map(|m| graph.sequence(m.pos.handle))
        .collect();
    assert_eq!(before_seq, after_seq);
    assert_eq!(graph.mapping_count(p), 1);
    let ranks: Vec<usize> = graph.mappings_iter(p).map(|m| m.rank).collect();
    assert_eq!(ranks, vec![1]);
}

#[test]
fn divide_with_multiple_paths_and_strands() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"TTTT");
    let h2 = graph.append_handle(b"ACGTACGT");
    let h3 = graph.append_handle(b"GG");
    graph.create_edge(Edge(h1, h2)).unwrap();
    graph.create_edge(Edge(h2, h3)).unwrap();

    let fwd = graph.create_path(b"fwd", false).unwrap();
    for h in [h1, h2, h3].iter() {
        graph.append_step(fwd, *h).unwrap();
    }
    let rev = graph.create_path(b"rev", false).unwrap();
    for h in [h3.flip(), h2.flip(), h1.flip()].iter() {
        graph.append_step(rev, *h).unwrap();
    }

    let spell = |graph: &HashGraph, path| -> Vec<u8> {
        graph
            .mappings_iter(path)
            .flat_map(|m| graph.sequence(m.pos.handle))
            .collect()
    };
    let fwd_before = spell(&graph, fwd);
    let rev_before = spell(&graph, rev);

    graph.divide_handle(h2, &[2, 5]).unwrap();
    validate(&graph).unwrap();

    assert_eq!(spell(&graph, fwd), fwd_before);
    assert_eq!(spell(&graph, rev), rev_before);

    // the reverse path sees the pieces mirrored
    let rev_steps: Vec<Handle> = graph
        .mappings_iter(rev)
        .map(|m| m.pos.handle)
        .collect();
    assert_eq!(rev_steps.len(), 5);
    assert!(rev_steps.iter().all(|h| h.is_reverse()));
}

#[test]
fn destroy_node_compacts_ranks() {
    let mut graph = path_graph();

    let p = graph.create_path(b"P", false).unwrap();
    for id in [1u64, 2, 5, 6].iter() {
        graph.append_step(p, hnd(*id)).unwrap();
    }

    assert!(graph.remove_handle(hnd(5)));
    validate(&graph).unwrap();

    let steps: Vec<Handle> =
        graph.mappings_iter(p).map(|m| m.pos.handle).collect();
    assert_eq!(steps, vec![hnd(1), hnd(2), hnd(6)]);
    let ranks: Vec<usize> = graph.mappings_iter(p).map(|m| m.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn gfa_round_trip_preserves_the_graph() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"ACGT");
    let h2 = graph.append_handle(b"GGGA");
    let h3 = graph.append_handle(b"TT");
    graph.create_edge(Edge(h1, h2)).unwrap();
    graph.create_edge(Edge(h2, h3)).unwrap();
    graph.create_edge(Edge(h1, h3)).unwrap();

    let p = graph.create_path(b"walk", false).unwrap();
    for h in [h1, h2, h3].iter() {
        graph.append_step(p, *h).unwrap();
    }

    let back = vargraph::conversion::rebuild(&graph).unwrap();

    assert_eq!(back.node_count(), graph.node_count());
    assert_eq!(back.edge_count(), graph.edge_count());
    for h in graph.handles_iter() {
        assert_eq!(back.sequence_slice(h), graph.sequence_slice(h));
    }

    let back_p = back.get_path_id(b"walk").unwrap();
    let walk: Vec<Handle> = back
        .mappings_iter(back_p)
        .map(|m| m.pos.handle)
        .collect();
    assert_eq!(walk, vec![h1, h2, h3]);
}
