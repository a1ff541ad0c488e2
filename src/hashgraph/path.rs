use bstr::BString;

use crate::pathgraph::{Edit, Mapping, PathId};

/// A named, rank-ordered walk stored as a list of mappings.
///
/// Mappings are kept in rank order; ranks are strictly increasing
/// along the list and contiguous from 1 after `compact_ranks`.
#[derive(Debug, Clone)]
pub struct Path {
    pub path_id: PathId,
    pub name: BString,
    pub is_circular: bool,
    pub mappings: Vec<Mapping>,
}

impl Path {
    pub fn new<T: Into<BString>>(
        name: T,
        path_id: PathId,
        is_circular: bool,
    ) -> Self {
        Path {
            name: name.into(),
            path_id,
            is_circular,
            mappings: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Total path bases over all mappings.
    pub fn bases_len(&self) -> usize {
        self.mappings.iter().map(|m| m.to_len()).sum()
    }

    /// Path-space offset of the start of the mapping at `index`.
    pub fn position_of_mapping(&self, index: usize) -> Option<usize> {
        if index >= self.mappings.len() {
            return None;
        }
        Some(self.mappings[..index].iter().map(|m| m.to_len()).sum())
    }

    /// Index of the mapping containing the path-space position `pos`,
    /// or `None` past the end.
    pub fn mapping_at_position(&self, pos: usize) -> Option<usize> {
        let mut bases = 0;
        for (ix, m) in self.mappings.iter().enumerate() {
            bases += m.to_len();
            if pos < bases {
                return Some(ix);
            }
        }
        None
    }

    /// Renumber ranks 1..k in list order.
    pub fn compact_ranks(&mut self) {
        for (ix, m) in self.mappings.iter_mut().enumerate() {
            m.rank = ix + 1;
        }
    }

    /// Next assignable rank.
    pub fn next_rank(&self) -> usize {
        self.mappings.last().map(|m| m.rank + 1).unwrap_or(1)
    }
}

/// Split one edit at `k` reference bases in, `0 < k < from_len`.
/// Deletions split in reference space only; other edits split their
/// path bases proportionally.
pub(crate) fn split_edit(edit: &Edit, k: usize) -> (Edit, Edit) {
    debug_assert!(k > 0 && k < edit.from_len);
    if edit.is_match() {
        (Edit::match_(k), Edit::match_(edit.from_len - k))
    } else if edit.is_deletion() {
        (Edit::deletion(k), Edit::deletion(edit.from_len - k))
    } else {
        let to_left = (edit.to_len * k) / edit.from_len;
        let (seq_l, seq_r) = if edit.seq.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let (l, r) = edit.seq.split_at(to_left);
            (l.to_vec(), r.to_vec())
        };
        (
            Edit {
                from_len: k,
                to_len: to_left,
                seq: seq_l,
            },
            Edit {
                from_len: edit.from_len - k,
                to_len: edit.to_len - to_left,
                seq: seq_r,
            },
        )
    }
}

/// Cut a mapping at the given reference offsets (relative to the
/// mapping's start, strictly increasing, inside `(0, from_len)`).
///
/// The parts keep the original handle; part `i` starts where part
/// `i - 1` ended on the same strand. Insertions sitting exactly on a
/// cut boundary stay with the left part. All parts inherit the
/// original rank; the caller renumbers.
pub(crate) fn cut_mapping(mapping: &Mapping, cuts: &[usize]) -> Vec<Mapping> {
    let mut parts: Vec<Mapping> = Vec::with_capacity(cuts.len() + 1);
    let mut current: Vec<Edit> = Vec::new();
    let mut part_start = 0usize;
    let mut consumed = 0usize;
    let mut cut_iter = cuts.iter().copied().peekable();

    let mut close_part =
        |current: &mut Vec<Edit>, part_start: &mut usize, consumed: usize| {
            let edits = std::mem::take(current);
            parts.push(Mapping {
                pos: crate::handle::Pos {
                    handle: mapping.pos.handle,
                    offset: mapping.pos.offset + *part_start,
                },
                edits,
                rank: mapping.rank,
            });
            *part_start = consumed;
        };

    for edit in mapping.edits.iter() {
        if edit.from_len == 0 {
            current.push(edit.clone());
            continue;
        }
        let mut remaining = edit.clone();
        loop {
            match cut_iter.peek().copied() {
                Some(cut) if consumed == cut => {
                    close_part(&mut current, &mut part_start, consumed);
                    cut_iter.next();
                }
                Some(cut) if consumed + remaining.from_len > cut => {
                    let (left, right) = split_edit(&remaining, cut - consumed);
                    consumed += left.from_len;
                    current.push(left);
                    close_part(&mut current, &mut part_start, consumed);
                    cut_iter.next();
                    remaining = right;
                }
                _ => break,
            }
        }
        consumed += remaining.from_len;
        current.push(remaining);
    }
    close_part(&mut current, &mut part_start, consumed);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Handle, Pos};

    fn mapping(offset: usize, edits: Vec<Edit>) -> Mapping {
        Mapping {
            pos: Pos {
                handle: Handle::pack(1u64, false),
                offset,
            },
            edits,
            rank: 1,
        }
    }

    #[test]
    fn cut_single_match() {
        let m = mapping(0, vec![Edit::match_(8)]);
        let parts = cut_mapping(&m, &[4]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].edits, vec![Edit::match_(4)]);
        assert_eq!(parts[1].edits, vec![Edit::match_(4)]);
        assert_eq!(parts[0].pos.offset, 0);
        assert_eq!(parts[1].pos.offset, 4);
    }

    #[test]
    fn cut_lands_between_edits() {
        let m = mapping(2, vec![Edit::match_(3), Edit::deletion(2)]);
        let parts = cut_mapping(&m, &[3]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].edits, vec![Edit::match_(3)]);
        assert_eq!(parts[1].edits, vec![Edit::deletion(2)]);
        assert_eq!(parts[1].pos.offset, 5);
    }

    #[test]
    fn insertion_stays_left_of_cut() {
        let m = mapping(
            0,
            vec![Edit::match_(2), Edit::insertion(b"TT"), Edit::match_(2)],
        );
        let parts = cut_mapping(&m, &[2]);
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0].edits,
            vec![Edit::match_(2), Edit::insertion(b"TT")]
        );
        assert_eq!(parts[1].edits, vec![Edit::match_(2)]);
    }

    #[test]
    fn multiple_cuts_sum_to_original() {
        let m = mapping(0, vec![Edit::match_(10)]);
        let parts = cut_mapping(&m, &[2, 5, 9]);
        assert_eq!(parts.len(), 4);
        let total: usize = parts.iter().map(|p| p.from_len()).sum();
        assert_eq!(total, 10);
        assert_eq!(
            parts.iter().map(|p| p.pos.offset).collect::<Vec<_>>(),
            vec![0, 2, 5, 9]
        );
    }

    #[test]
    fn path_rank_compaction() {
        let mut path = Path::new("p", 0, false);
        for rank in [3usize, 7, 9].iter() {
            path.mappings.push(Mapping {
                pos: Pos {
                    handle: Handle::pack(1u64, false),
                    offset: 0,
                },
                edits: vec![Edit::match_(1)],
                rank: *rank,
            });
        }
        path.compact_ranks();
        assert_eq!(
            path.mappings.iter().map(|m| m.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(path.next_rank(), 4);
    }
}
