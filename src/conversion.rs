/*!

Conversion between GFA and handlegraphs. This is the path-mapping
import surface: GFA paths arrive as ordered (segment, orientation)
lists and become full-node match mappings with ranks derived from
their position.

*/

use std::path::Path as FilePath;

use anyhow::Context;

use crate::{
    error::Result,
    handle::{Edge, Handle, NodeId},
    handlegraph::HandleGraph,
    hashgraph::HashGraph,
    mutablehandlegraph::*,
    pathgraph::PathHandleGraph,
};

use gfa::{
    gfa::{Line, Link, Orientation, Path, Segment, GFA},
    optfields::OptFields,
    parser::{GFAParser, GFAResult},
};

use bstr::BString;

fn is_reverse(orient: Orientation) -> bool {
    match orient {
        Orientation::Forward => false,
        Orientation::Backward => true,
    }
}

/// Parse the overlap length out of a simple `<n>M` CIGAR; anything
/// else is treated as blunt.
fn parse_overlap(cigar: &[u8]) -> usize {
    match cigar.split_last() {
        Some((b'M', digits)) if !digits.is_empty() => {
            std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        }
        _ => 0,
    }
}

pub fn from_gfa<G, T>(gfa: &GFA<usize, T>) -> G
where
    G: Default + MutableHandleGraph + PathHandleGraph,
    T: OptFields,
{
    let mut graph: G = Default::default();

    for segment in gfa.segments.iter() {
        assert!(segment.name > 0);
        graph
            .create_handle(&segment.sequence, segment.name)
            .expect("duplicate segment name in GFA");
    }

    for link in gfa.links.iter() {
        let left = Handle::new(link.from_segment, is_reverse(link.from_orient));
        let right = Handle::new(link.to_segment, is_reverse(link.to_orient));
        let overlap = parse_overlap(&link.overlap);
        graph
            .create_edge_with_overlap(Edge(left, right), overlap)
            .expect("GFA link references a missing segment");
    }

    for path in gfa.paths.iter() {
        let path_id = graph
            .create_path(&path.path_name, false)
            .expect("duplicate path name in GFA");
        for (seg, orient) in path.iter() {
            let handle = Handle::new(seg, is_reverse(orient));
            graph
                .append_step(path_id, handle)
                .expect("GFA path references a missing segment");
        }
    }

    graph
}

pub fn fill_gfa_lines<G, I, T>(graph: &mut G, gfa_lines: I) -> GFAResult<()>
where
    G: MutableHandleGraph + PathHandleGraph,
    I: Iterator<Item = GFAResult<Line<usize, T>>>,
    T: OptFields,
{
    for line in gfa_lines {
        let line = line?;
        match line {
            Line::Segment(v) => {
                let id = NodeId::from(v.name);
                graph
                    .create_handle(&v.sequence, id)
                    .expect("duplicate segment name in GFA");
            }
            Line::Link(v) => {
                let left = Handle::new(v.from_segment, is_reverse(v.from_orient));
                let right = Handle::new(v.to_segment, is_reverse(v.to_orient));
                let overlap = parse_overlap(&v.overlap);
                graph
                    .create_edge_with_overlap(Edge(left, right), overlap)
                    .expect("GFA link references a missing segment");
            }
            Line::Path(v) => {
                let path_id = graph
                    .create_path(&v.path_name, false)
                    .expect("duplicate path name in GFA");
                for (seg, orient) in v.iter() {
                    let handle = Handle::new(seg, is_reverse(orient));
                    graph
                        .append_step(path_id, handle)
                        .expect("GFA path references a missing segment");
                }
            }
            _ => (),
        }
    }

    Ok(())
}

/// Parse a GFA file straight into a `HashGraph`.
pub fn load_gfa<P: AsRef<FilePath>>(path: P) -> anyhow::Result<HashGraph> {
    let parser: GFAParser<usize, ()> = GFAParser::new();
    let gfa = parser
        .parse_file(path.as_ref())
        .with_context(|| format!("parsing GFA {}", path.as_ref().display()))?;
    Ok(from_gfa(&gfa))
}

pub fn to_gfa(graph: &HashGraph) -> GFA<usize, ()> {
    let mut gfa = GFA::new();

    for handle in graph.handles_iter() {
        let name = usize::from(handle.id());
        let sequence: BString = graph.sequence_slice(handle).into();

        gfa.segments.push(Segment {
            name,
            sequence: sequence.to_vec(),
            optional: (),
        });
    }

    let orient = |rev: bool| {
        if rev {
            Orientation::Backward
        } else {
            Orientation::Forward
        }
    };

    for edge in graph.edges_iter() {
        let Edge(left, right) = edge;
        let overlap: BString =
            format!("{}M", graph.edge_overlap(edge)).into();

        gfa.links.push(Link {
            from_segment: usize::from(left.id()),
            from_orient: orient(left.is_reverse()),
            to_segment: usize::from(right.id()),
            to_orient: orient(right.is_reverse()),
            overlap: overlap.to_vec(),
            optional: (),
        });
    }

    for path_id in graph.path_ids_iter() {
        let path_name: BString = graph.path_name(path_id).unwrap().into();

        let mut segment_names: Vec<Vec<u8>> = Vec::new();
        for (ix, mapping) in graph.mappings_iter(path_id).enumerate() {
            if ix != 0 {
                segment_names.push(b",".to_vec());
            }
            let handle = mapping.pos.handle;
            let segment: usize = handle.id().into();
            segment_names.push(segment.to_string().into_bytes());
            segment_names
                .push(orient(handle.is_reverse()).to_string().into_bytes());
        }
        let segment_names: BString =
            segment_names.into_iter().flatten().collect();

        gfa.paths.push(Path::new(
            path_name.to_vec(),
            segment_names.to_vec(),
            Vec::new(),
            (),
        ));
    }

    gfa
}

/// Round-trip helper used by tests and by callers that want a fresh
/// graph sharing nothing with the source.
pub fn rebuild(graph: &HashGraph) -> Result<HashGraph> {
    let gfa = to_gfa(graph);
    Ok(HashGraph::from_gfa(&gfa))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_cigars() {
        assert_eq!(parse_overlap(b"0M"), 0);
        assert_eq!(parse_overlap(b"55M"), 55);
        assert_eq!(parse_overlap(b"*"), 0);
        assert_eq!(parse_overlap(b""), 0);
        assert_eq!(parse_overlap(b"M"), 0);
    }
}
