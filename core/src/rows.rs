//! First-fit interval packing of pairs into display rows
//!
//! This approximates a genome-browser squish view. The packing is greedy
//! first-fit over rows in creation order, not an optimal interval-graph
//! coloring; that matches conventional browser behavior and keeps the layout
//! stable for identical input.

use crate::pair::ReadPair;

/// One horizontal lane of non-colliding pairs, in genomic order.
#[derive(Debug, Default)]
pub struct Row {
    pairs: Vec<ReadPair>,
}

impl Row {
    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Pack pairs into rows.
///
/// Pairs are sorted by (contig, start, end) with a stable sort, pairs whose
/// every present segment is filtered are discarded, and each remaining pair
/// goes to the first row whose last occupant ends more than `min_gap` bases
/// before it. When `max_rows` is reached the pair is silently dropped from
/// display; that is never an error.
pub fn pack_rows(
    mut pairs: Vec<ReadPair>,
    min_gap: u64,
    max_rows: Option<usize>,
    show_clip: bool,
) -> Vec<Row> {
    pairs.sort_by(|a, b| a.cmp_by_span(b, show_clip));

    let mut rows: Vec<Row> = Vec::new();
    for pair in pairs {
        if pair.fully_filtered() {
            continue;
        }
        let start = pair.start(show_clip);
        let slot = rows.iter().position(|row| {
            row.pairs
                .last()
                .map_or(false, |last| last.end(show_clip) + min_gap < start)
        });
        match slot {
            Some(y) => rows[y].pairs.push(pair),
            None => {
                if max_rows.map_or(true, |cap| rows.len() < cap) {
                    rows.push(Row { pairs: vec![pair] });
                }
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlignedRead, CigarOp, CigarOpKind, ReadFlags, Strand};

    fn singleton(name: &str, start: u64, len: u32) -> ReadPair {
        ReadPair::singleton(AlignedRead::new(
            name,
            "chr1",
            start,
            vec![CigarOp::new(CigarOpKind::Match, len)],
            Strand::Forward,
            ReadFlags::default(),
            None,
            0,
        ))
    }

    fn filtered_singleton(name: &str, start: u64, len: u32) -> ReadPair {
        ReadPair::singleton(
            AlignedRead::new(
                name,
                "chr1",
                start,
                vec![CigarOp::new(CigarOpKind::Match, len)],
                Strand::Forward,
                ReadFlags::default(),
                None,
                0,
            )
            .with_filtered(true),
        )
    }

    #[test]
    fn test_close_reads_spill_into_new_rows() {
        // three reads of length 20 spaced 5 bases apart collide at min_gap 10
        let pairs = vec![
            singleton("a", 100, 20),
            singleton("b", 125, 20),
            singleton("c", 150, 20),
        ];
        let rows = pack_rows(pairs, 10, None, false);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn test_distant_reads_share_a_row() {
        let pairs = vec![singleton("a", 100, 20), singleton("b", 200, 20)];
        let rows = pack_rows(pairs, 10, None, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_min_gap_invariant_holds_in_every_row() {
        let pairs: Vec<ReadPair> = (0..40)
            .map(|i| singleton(&format!("r{}", i), 100 + i * 17, 30))
            .collect();
        let min_gap = 10;
        let rows = pack_rows(pairs, min_gap, None, false);
        let mut placed = 0;
        for row in &rows {
            for window in row.pairs().windows(2) {
                assert!(window[0].end(false) + min_gap < window[1].start(false));
            }
            placed += row.len();
        }
        // every pair placed exactly once
        assert_eq!(placed, 40);
    }

    #[test]
    fn test_row_cap_drops_overflow() {
        let pairs = vec![
            singleton("a", 100, 20),
            singleton("b", 105, 20),
            singleton("c", 110, 20),
        ];
        let rows = pack_rows(pairs, 10, Some(2), false);
        assert_eq!(rows.len(), 2);
        let placed: usize = rows.iter().map(Row::len).sum();
        assert_eq!(placed, 2);
    }

    #[test]
    fn test_fully_filtered_pairs_discarded() {
        let pairs = vec![filtered_singleton("a", 100, 20), singleton("b", 105, 20)];
        let rows = pack_rows(pairs, 10, None, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pairs()[0].r1().name, "b");
    }

    #[test]
    fn test_sorted_before_packing() {
        let pairs = vec![singleton("late", 500, 20), singleton("early", 100, 20)];
        let rows = pack_rows(pairs, 10, None, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pairs()[0].r1().name, "early");
        assert_eq!(rows[0].pairs()[1].r1().name, "late");
    }
}
