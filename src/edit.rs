/*!

The edit engine: apply walks-with-edits to the graph by splitting
nodes at breakpoints and grafting novel sequence, leaving a
translation from old coordinates to the new nodes.

*/

use std::collections::BTreeSet;

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
    error::{GraphError, Result},
    handle::{Edge, Handle, NodeId, Pos},
    handlegraph::HandleGraph,
    hashgraph::{HashGraph, Path},
    mutablehandlegraph::*,
    pathgraph::PathHandleGraph,
};

#[allow(unused_imports)]
use log::{debug, info};

/// How one stretch of an applied path landed in the edited graph:
/// either a stretch of original sequence now living on a (possibly
/// new) node, or novel sequence with no original position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Where the stretch started in the original graph; `None` for
    /// novel insertions.
    pub old: Option<Pos>,
    /// Where the stretch starts now.
    pub new: Pos,
    /// Stretch length in bases.
    pub len: usize,
}

/// Default bound on novel node lengths.
pub const MAX_NOVEL_NODE_LENGTH: usize = 1024;

/// The pieces one original node was divided into: forward-strand
/// intervals and the handles now covering them.
struct NodePieces {
    len: usize,
    pieces: Vec<(usize, usize, Handle)>,
}

impl NodePieces {
    /// The pieces covering the strand interval `[from, to)`, in
    /// strand order. Both ends must fall on piece boundaries, which
    /// the breakpoint pass guarantees.
    fn run(&self, from: usize, to: usize, reverse: bool) -> Vec<Handle> {
        let (fs, fe) = if reverse {
            (self.len - to, self.len - from)
        } else {
            (from, to)
        };
        let mut covered: Vec<Handle> = self
            .pieces
            .iter()
            .filter(|(s, e, _)| *s >= fs && *e <= fe)
            .map(|(_, _, h)| *h)
            .collect();
        if reverse {
            covered.reverse();
            for h in covered.iter_mut() {
                *h = h.flip();
            }
        }
        covered
    }
}

/// Apply a set of walks-with-edits to the graph.
///
/// Each path's mappings anchor on existing nodes; their non-match
/// edits introduce breakpoints and novel nodes. When `embed` is set,
/// every applied path is also stored in the graph's path collection
/// under its own name. Novel runs longer than `max_node_length` are
/// chopped. Returns the translation records.
pub fn edit(
    graph: &mut HashGraph,
    paths: &[Path],
    embed: bool,
    max_node_length: usize,
) -> Result<Vec<Translation>> {
    let max_node_length = max_node_length.max(1);

    // 1. simplify: merge adjacent match edits
    let mut paths: Vec<Path> = paths.to_vec();
    for path in paths.iter_mut() {
        for mapping in path.mappings.iter_mut() {
            mapping.simplify();
        }
    }

    // 2. collect breakpoints on the forward strand
    let mut breakpoints: FnvHashMap<NodeId, BTreeSet<usize>> =
        FnvHashMap::default();
    for path in paths.iter() {
        for mapping in path.mappings.iter() {
            let id = mapping.pos.id();
            if !graph.has_node(id) {
                return Err(GraphError::NodeNotFound(id));
            }
            let len = graph.length(mapping.pos.handle);
            if mapping.pos.offset + mapping.from_len() > len {
                return Err(GraphError::invalid(format!(
                    "mapping runs {} bases past node {}",
                    mapping.pos.offset + mapping.from_len() - len,
                    id
                )));
            }
            let reverse = mapping.pos.is_reverse();
            let to_fwd =
                |o: usize| if reverse { len - o } else { o };

            let mut cursor = mapping.pos.offset;
            let node_breaks = breakpoints.entry(id).or_default();
            node_breaks.insert(to_fwd(cursor));
            for e in mapping.edits.iter() {
                cursor += e.from_len;
                node_breaks.insert(to_fwd(cursor));
            }
        }
    }
    for (_, breaks) in breakpoints.iter_mut() {
        breaks.remove(&0);
    }

    // 3. materialize the breakpoints
    let node_lengths: FnvHashMap<NodeId, usize> = breakpoints
        .keys()
        .map(|&id| (id, graph.length(Handle::pack(id, false))))
        .collect();

    let mut pieces: FnvHashMap<NodeId, NodePieces> = FnvHashMap::default();
    let mut ids: Vec<NodeId> = breakpoints.keys().copied().collect();
    ids.sort();
    for id in ids {
        let len = node_lengths[&id];
        let offsets: Vec<usize> = breakpoints[&id]
            .iter()
            .copied()
            .filter(|&o| o > 0 && o < len)
            .collect();
        let handles = graph.divide_handle(Handle::pack(id, false), &offsets)?;

        let mut bounds = Vec::with_capacity(offsets.len() + 2);
        bounds.push(0);
        bounds.extend_from_slice(&offsets);
        bounds.push(len);
        let intervals: Vec<(usize, usize, Handle)> = handles
            .into_iter()
            .enumerate()
            .map(|(i, h)| (bounds[i], bounds[i + 1], h))
            .collect();

        pieces.insert(id, NodePieces {
            len,
            pieces: intervals,
        });
    }

    let piece_for = |graph: &HashGraph, id: NodeId| -> NodePieces {
        // untouched nodes act as their own single piece
        let len = graph.length(Handle::pack(id, false));
        NodePieces {
            len,
            pieces: vec![(0, len, Handle::pack(id, false))],
        }
    };

    // 4. walk the paths, grafting novel sequence
    let mut translations: Vec<Translation> = Vec::new();
    let mut novel_cache: FnvHashMap<(u64, usize, Vec<u8>), Vec<Handle>> =
        FnvHashMap::default();
    let mut embedded: Vec<(Vec<u8>, Vec<Handle>)> = Vec::new();

    for path in paths.iter() {
        let mut dangling: FnvHashSet<Handle> = FnvHashSet::default();
        let mut walk: Vec<Handle> = Vec::new();

        for mapping in path.mappings.iter() {
            let id = mapping.pos.id();
            let reverse = mapping.pos.is_reverse();
            let whole_node;
            let node_pieces = match pieces.get(&id) {
                Some(p) => p,
                None => {
                    // not split anywhere: a whole-node view
                    whole_node = piece_for(graph, id);
                    &whole_node
                }
            };

            let mut cursor = mapping.pos.offset;

            for e in mapping.edits.iter() {
                if e.is_match() {
                    let run =
                        node_pieces.run(cursor, cursor + e.from_len, reverse);
                    let entry = *run.first().ok_or_else(|| {
                        GraphError::invariant(format!(
                            "no piece covers {}:{}",
                            id, cursor
                        ))
                    })?;
                    let exit = *run.last().unwrap();

                    for d in dangling.drain().collect::<Vec<_>>() {
                        graph.create_edge(Edge(d, entry))?;
                    }
                    dangling.insert(exit);

                    translations.push(Translation {
                        old: Some(Pos {
                            handle: mapping.pos.handle,
                            offset: cursor,
                        }),
                        new: Pos {
                            handle: entry,
                            offset: 0,
                        },
                        len: e.from_len,
                    });
                    walk.extend(run);

                    cursor += e.from_len;
                } else if e.to_len > 0 {
                    // insertion or substitution: novel sequence
                    let key = (
                        mapping.pos.handle.as_integer(),
                        cursor,
                        e.seq.clone(),
                    );
                    if !novel_cache.contains_key(&key) {
                        let run = create_novel_run(
                            graph,
                            &e.seq,
                            max_node_length,
                        )?;
                        translations.push(Translation {
                            old: None,
                            new: Pos {
                                handle: run[0],
                                offset: 0,
                            },
                            len: e.seq.len(),
                        });
                        novel_cache.insert(key.clone(), run);
                    }
                    let run = novel_cache[&key].clone();
                    let first = *run.first().unwrap();
                    let last = *run.last().unwrap();

                    for d in dangling.drain().collect::<Vec<_>>() {
                        graph.create_edge(Edge(d, first))?;
                    }
                    dangling.insert(last);
                    walk.extend(run);

                    cursor += e.from_len;
                } else {
                    // deletion: advance without touching dangling
                    cursor += e.from_len;
                }
            }
        }

        if embed {
            embedded.push((path.name.to_vec(), walk));
        }
    }

    // 5. embed the applied paths
    for (name, walk) in embedded {
        let path_id = graph.create_path(&name, false)?;
        for h in walk {
            graph.append_step(path_id, h)?;
        }
    }

    Ok(translations)
}

/// Create a run of novel nodes carrying `seq`, chopped to the length
/// bound and chained left to right.
fn create_novel_run(
    graph: &mut HashGraph,
    seq: &[u8],
    max_node_length: usize,
) -> Result<Vec<Handle>> {
    if seq.is_empty() {
        return Err(GraphError::invalid("novel run with empty sequence"));
    }

    let mut handles: Vec<Handle> = Vec::new();
    for chunk in seq.chunks(max_node_length) {
        handles.push(graph.append_handle(chunk));
    }
    for pair in handles.windows(2) {
        graph.create_edge(Edge(pair[0], pair[1]))?;
    }

    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathgraph::{Edit, Mapping};

    fn hnd(x: u64) -> Handle {
        Handle::pack(x, false)
    }

    fn edit_path(name: &[u8], mappings: Vec<Mapping>) -> Path {
        let mut path = Path::new(name, 0, false);
        path.mappings = mappings;
        path
    }

    #[test]
    fn insertion_edit_splits_and_grafts() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGT");

        let path = edit_path(
            b"edited",
            vec![Mapping {
                pos: Pos {
                    handle: h1,
                    offset: 0,
                },
                edits: vec![
                    Edit::match_(2),
                    Edit::insertion(b"TT"),
                    Edit::match_(2),
                ],
                rank: 1,
            }],
        );

        let translations = edit(&mut graph, &[path], true, 1024).unwrap();

        // node 1 split at offset 2, novel TT between the halves
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.sequence(hnd(1)), b"AC".to_vec());
        assert_eq!(graph.sequence(hnd(2)), b"GT".to_vec());
        assert_eq!(graph.sequence(hnd(3)), b"TT".to_vec());
        assert!(graph.has_edge(hnd(1), hnd(3)));
        assert!(graph.has_edge(hnd(3), hnd(2)));

        // the embedded path walks AC, TT, GT with dense ranks
        let path_id = graph.get_path_id(b"edited").unwrap();
        let steps: Vec<Handle> = graph
            .mappings_iter(path_id)
            .map(|m| m.pos.handle)
            .collect();
        assert_eq!(steps, vec![hnd(1), hnd(3), hnd(2)]);
        let ranks: Vec<usize> =
            graph.mappings_iter(path_id).map(|m| m.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        // translations cover both matched halves and the insertion
        assert_eq!(translations.len(), 3);
        assert!(translations.iter().any(|t| t.old.is_none() && t.len == 2));
    }

    #[test]
    fn deletion_edit_bridges_over_bases() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGTAC");

        let path = edit_path(
            b"del",
            vec![Mapping {
                pos: Pos {
                    handle: h1,
                    offset: 0,
                },
                edits: vec![
                    Edit::match_(2),
                    Edit::deletion(2),
                    Edit::match_(2),
                ],
                rank: 1,
            }],
        );

        edit(&mut graph, &[path], true, 1024).unwrap();

        // split at 2 and 4; the deletion adds a bypass edge
        assert_eq!(graph.node_count(), 3);
        let pieces: Vec<Vec<u8>> = vec![
            graph.sequence(hnd(1)),
            graph.sequence(hnd(2)),
            graph.sequence(hnd(3)),
        ];
        assert_eq!(pieces, vec![b"AC".to_vec(), b"GT".to_vec(), b"AC".to_vec()]);
        // bypass from the first piece to the last
        assert!(graph.has_edge(hnd(1), hnd(3)));

        let path_id = graph.get_path_id(b"del").unwrap();
        let steps: Vec<Handle> = graph
            .mappings_iter(path_id)
            .map(|m| m.pos.handle)
            .collect();
        assert_eq!(steps, vec![hnd(1), hnd(3)]);
    }

    #[test]
    fn long_insertions_are_chopped() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AC");

        let path = edit_path(
            b"ins",
            vec![Mapping {
                pos: Pos {
                    handle: h1,
                    offset: 0,
                },
                edits: vec![
                    Edit::match_(2),
                    Edit::insertion(b"TTTTTTTTTT"),
                ],
                rank: 1,
            }],
        );

        edit(&mut graph, &[path], false, 4).unwrap();

        // ten bases of novel sequence at four per node
        assert_eq!(graph.node_count(), 4);
        let mut novel: Vec<usize> = (2u64..=4)
            .map(|id| graph.sequence(hnd(id)).len())
            .collect();
        novel.sort();
        assert_eq!(novel, vec![2, 4, 4]);
    }

    #[test]
    fn identical_insertions_share_nodes() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"ACGT");

        let mapping = Mapping {
            pos: Pos {
                handle: h1,
                offset: 0,
            },
            edits: vec![
                Edit::match_(2),
                Edit::insertion(b"GG"),
                Edit::match_(2),
            ],
            rank: 1,
        };
        let path_a = edit_path(b"a", vec![mapping.clone()]);
        let path_b = edit_path(b"b", vec![mapping]);

        edit(&mut graph, &[path_a, path_b], false, 1024).unwrap();

        // the insertion is deduplicated through the novel-node cache
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn reverse_strand_mapping_splits_mirrored() {
        let mut graph = HashGraph::new();
        let h1 = graph.append_handle(b"AACCGG");

        // two matched bases at the start of the reverse strand, then
        // an insertion
        let path = edit_path(
            b"rev",
            vec![Mapping {
                pos: Pos {
                    handle: h1.flip(),
                    offset: 0,
                },
                edits: vec![Edit::match_(2), Edit::insertion(b"A")],
                rank: 1,
            }],
        );

        edit(&mut graph, &[path], false, 1024).unwrap();

        // the node split at forward offset 4
        assert!(graph.has_node(NodeId(2)));
        assert_eq!(graph.sequence(hnd(1)), b"AACC".to_vec());
        assert_eq!(graph.sequence(hnd(2)), b"GG".to_vec());
        // the novel base hangs off the reverse-strand exit, i.e. the
        // left side of the first piece
        let novel = hnd(3);
        assert_eq!(graph.sequence(novel), b"A".to_vec());
        assert!(graph.has_edge(hnd(2).flip(), novel));
    }
}
