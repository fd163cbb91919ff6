use std::fmt;

/// 1-based genomic position, matching SAM coordinates.
pub type Position = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// CIGAR operation kinds, one per SAM operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarOpKind {
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Deletion
                | CigarOpKind::Skip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Insertion
                | CigarOpKind::SoftClip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, CigarOpKind::SoftClip | CigarOpKind::HardClip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub kind: CigarOpKind,
    pub len: u32,
}

impl CigarOp {
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// SAM flag state relevant to pairing and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlags {
    pub paired: bool,
    pub proper_pair: bool,
    pub mate_unmapped: bool,
    pub first_of_pair: bool,
    pub second_of_pair: bool,
    pub duplicate: bool,
    pub secondary: bool,
    pub supplementary: bool,
    pub qc_fail: bool,
}

/// One mapped sequencing read, restricted to a single contig.
///
/// The aligned end and the unclipped bounds are derived from the CIGAR once at
/// construction. `filtered` is the outcome of the caller's record filter; the
/// engine never applies a filter itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    pub name: String,
    pub contig: String,
    pub start: Position,
    pub cigar: Vec<CigarOp>,
    pub strand: Strand,
    pub flags: ReadFlags,
    pub mate_contig: Option<String>,
    pub mate_start: Position,
    pub read_group: Option<String>,
    pub filtered: bool,
    end: Position,
    unclipped_start: Position,
    unclipped_end: Position,
}

impl AlignedRead {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        contig: impl Into<String>,
        start: Position,
        cigar: Vec<CigarOp>,
        strand: Strand,
        flags: ReadFlags,
        mate_contig: Option<String>,
        mate_start: Position,
    ) -> Self {
        let (end, unclipped_start, unclipped_end) = cigar_bounds(start, &cigar);
        Self {
            name: name.into(),
            contig: contig.into(),
            start,
            cigar,
            strand,
            flags,
            mate_contig,
            mate_start,
            read_group: None,
            filtered: false,
            end,
            unclipped_start,
            unclipped_end,
        }
    }

    pub fn with_read_group(mut self, rg: impl Into<String>) -> Self {
        self.read_group = Some(rg.into());
        self
    }

    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }

    /// 1-based inclusive end of the aligned span.
    pub fn end(&self) -> Position {
        self.end
    }

    pub fn unclipped_start(&self) -> Position {
        self.unclipped_start
    }

    pub fn unclipped_end(&self) -> Position {
        self.unclipped_end
    }

    /// Left display edge: the unclipped bound when clips are drawn.
    pub fn left_edge(&self, show_clip: bool) -> Position {
        if show_clip {
            self.unclipped_start
        } else {
            self.start
        }
    }

    pub fn right_edge(&self, show_clip: bool) -> Position {
        if show_clip {
            self.unclipped_end
        } else {
            self.end
        }
    }

    /// True when the mate is declared mapped on the same contig.
    pub fn mate_on_same_contig(&self) -> bool {
        self.flags.paired
            && !self.flags.mate_unmapped
            && self.mate_contig.as_deref() == Some(self.contig.as_str())
    }
}

fn cigar_bounds(start: Position, cigar: &[CigarOp]) -> (Position, Position, Position) {
    let ref_len: u64 = cigar
        .iter()
        .filter(|op| op.kind.consumes_reference())
        .map(|op| op.len as u64)
        .sum();
    let end = if ref_len == 0 { start } else { start + ref_len - 1 };

    let leading: u64 = cigar
        .iter()
        .take_while(|op| op.kind.is_clip())
        .map(|op| op.len as u64)
        .sum();
    let trailing: u64 = cigar
        .iter()
        .rev()
        .take_while(|op| op.kind.is_clip())
        .map(|op| op.len as u64)
        .sum();

    (end, start.saturating_sub(leading).max(1), end + trailing)
}

/// A gene model pre-filtered to the rendered interval.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneModel {
    pub name: String,
    pub strand: Strand,
    pub tx_start: Position,
    pub tx_end: Position,
    pub cds_start: Position,
    pub cds_end: Position,
    pub exons: Vec<(Position, Position)>,
}

impl GeneModel {
    pub fn is_coding(&self) -> bool {
        self.cds_start < self.cds_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(spec: &[(CigarOpKind, u32)]) -> Vec<CigarOp> {
        spec.iter().map(|&(k, l)| CigarOp::new(k, l)).collect()
    }

    #[test]
    fn test_cigar_bounds_simple_match() {
        let read = AlignedRead::new(
            "r",
            "chr1",
            100,
            ops(&[(CigarOpKind::Match, 50)]),
            Strand::Forward,
            ReadFlags::default(),
            None,
            0,
        );
        assert_eq!(read.end(), 149);
        assert_eq!(read.unclipped_start(), 100);
        assert_eq!(read.unclipped_end(), 149);
    }

    #[test]
    fn test_cigar_bounds_with_clips_and_deletion() {
        // 5S10M5D10M3H spans 10+5+10 = 25 reference bases
        let read = AlignedRead::new(
            "r",
            "chr1",
            100,
            ops(&[
                (CigarOpKind::SoftClip, 5),
                (CigarOpKind::Match, 10),
                (CigarOpKind::Deletion, 5),
                (CigarOpKind::Match, 10),
                (CigarOpKind::HardClip, 3),
            ]),
            Strand::Forward,
            ReadFlags::default(),
            None,
            0,
        );
        assert_eq!(read.end(), 124);
        assert_eq!(read.unclipped_start(), 95);
        assert_eq!(read.unclipped_end(), 127);
        assert_eq!(read.left_edge(true), 95);
        assert_eq!(read.left_edge(false), 100);
    }

    #[test]
    fn test_insertion_does_not_consume_reference() {
        let read = AlignedRead::new(
            "r",
            "chr1",
            10,
            ops(&[
                (CigarOpKind::Match, 10),
                (CigarOpKind::Insertion, 5),
                (CigarOpKind::Match, 10),
            ]),
            Strand::Forward,
            ReadFlags::default(),
            None,
            0,
        );
        assert_eq!(read.end(), 29);
    }

    #[test]
    fn test_op_kind_predicates() {
        assert!(CigarOpKind::Match.consumes_reference());
        assert!(CigarOpKind::Match.consumes_read());
        assert!(CigarOpKind::Deletion.consumes_reference());
        assert!(!CigarOpKind::Deletion.consumes_read());
        assert!(!CigarOpKind::Insertion.consumes_reference());
        assert!(CigarOpKind::Insertion.consumes_read());
        assert!(CigarOpKind::SoftClip.is_clip());
        assert!(CigarOpKind::HardClip.is_clip());
        assert!(!CigarOpKind::SequenceMismatch.is_clip());
    }
}
