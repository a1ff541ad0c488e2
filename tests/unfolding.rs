use vargraph::{
    algorithms,
    handle::{Edge, Handle, NodeId},
    handlegraph::HandleGraph,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
    pathgraph::PathHandleGraph,
    phase_unfolder::{HaplotypeSet, PhaseUnfolder},
    util::validate::validate,
};

fn hnd(x: u64) -> Handle {
    Handle::pack(x, false)
}

fn nested_bubbles() -> HashGraph {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"ATG");
    let h2 = graph.append_handle(b"C");
    let h3 = graph.append_handle(b"GA");
    let h4 = graph.append_handle(b"T");
    let h5 = graph.append_handle(b"CCA");

    graph.create_edge(Edge(h1, h2)).unwrap();
    graph.create_edge(Edge(h1, h3)).unwrap();
    graph.create_edge(Edge(h2, h4)).unwrap();
    graph.create_edge(Edge(h3, h4)).unwrap();
    graph.create_edge(Edge(h4, h5)).unwrap();

    graph
}

#[test]
fn chop_then_unchop_preserves_path_spelling() {
    let mut graph = HashGraph::new();
    let h1 = graph.append_handle(b"ACGTACGTT");
    let h2 = graph.append_handle(b"GGAGG");
    graph.create_edge(Edge(h1, h2)).unwrap();

    let p = graph.create_path(b"walk", false).unwrap();
    graph.append_step(p, h1).unwrap();
    graph.append_step(p, h2).unwrap();

    let spell = |graph: &HashGraph, path| -> Vec<u8> {
        graph
            .mappings_iter(path)
            .flat_map(|m| graph.sequence(m.pos.handle))
            .collect()
    };
    let before = spell(&graph, p);

    algorithms::chop(&mut graph, 3).unwrap();
    validate(&graph).unwrap();
    for h in graph.handles_iter() {
        assert!(graph.length(h) <= 3);
    }
    assert_eq!(spell(&graph, p), before);

    algorithms::unchop(&mut graph);
    validate(&graph).unwrap();
    assert_eq!(spell(&graph, p), before);
    // everything merges back into one node per simple component
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn pruned_nested_region_is_unfolded_from_haplotypes() {
    let original = nested_bubbles();

    let mut haplotypes = HaplotypeSet::new();
    haplotypes.insert(vec![hnd(1), hnd(2), hnd(4), hnd(5)]);
    haplotypes.insert(vec![hnd(1), hnd(3), hnd(4), hnd(5)]);

    // prune the tangle between 1 and 5
    let mut working = nested_bubbles();
    working.remove_handle(hnd(2));
    working.remove_handle(hnd(3));
    working.remove_handle(hnd(4));
    validate(&working).unwrap();

    let next = original.max_node_id() + 1;
    let mut unfolder = PhaseUnfolder::new(&original, &haplotypes, next);
    let inserted = unfolder.unfold(&mut working).unwrap();
    validate(&working).unwrap();

    assert_eq!(inserted, 2);

    // two disjoint border-to-border walks: each duplicates its own
    // interior, including separate copies of node 4
    assert_eq!(working.node_count(), 2 + 4);

    // every supported walk spells out of the working graph
    let mut spelled: Vec<Vec<u8>> = Vec::new();
    let mut stack: Vec<(Handle, Vec<u8>)> =
        vec![(hnd(1), original.sequence_slice(hnd(1)).to_vec())];
    while let Some((h, seq)) = stack.pop() {
        let mut extended = false;
        for next in
            working.handle_edges_iter(h, vargraph::handle::Direction::Right)
        {
            let mut next_seq = seq.clone();
            next_seq.extend(working.sequence(next));
            stack.push((next, next_seq));
            extended = true;
        }
        if !extended {
            spelled.push(seq);
        }
    }
    spelled.sort();
    assert_eq!(
        spelled,
        vec![b"ATGCTCCA".to_vec(), b"ATGGATCCA".to_vec()]
    );

    // no cross-links between the two walks survive
    for id in 6u64..=10 {
        if !working.has_node(NodeId(id)) {
            continue;
        }
        assert!(
            working.degree(hnd(id), vargraph::handle::Direction::Left) <= 1
        );
        assert!(
            working.degree(hnd(id), vargraph::handle::Direction::Right) <= 1
        );
    }
}

#[test]
fn normalize_after_unfolding_restores_sharing() {
    let original = nested_bubbles();

    let mut haplotypes = HaplotypeSet::new();
    haplotypes.insert(vec![hnd(1), hnd(2), hnd(4), hnd(5)]);
    haplotypes.insert(vec![hnd(1), hnd(3), hnd(4), hnd(5)]);

    let mut working = nested_bubbles();
    working.remove_handle(hnd(2));
    working.remove_handle(hnd(3));
    working.remove_handle(hnd(4));

    let next = original.max_node_id() + 1;
    let mut unfolder = PhaseUnfolder::new(&original, &haplotypes, next);
    unfolder.unfold(&mut working).unwrap();

    let unfolded_length = working.total_length();
    algorithms::normalize(&mut working, 10).unwrap();
    validate(&working).unwrap();

    // the duplicated T suffix folds back together
    assert!(working.total_length() < unfolded_length);
}
