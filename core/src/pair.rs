//! Mate-pair reconstruction
//!
//! Reads arrive one at a time, restricted to a single contig; the mate of a
//! read may never arrive because it lies outside the fetched window. Pairing
//! therefore relies on the declared mate coordinates carried by each record,
//! and a pair whose second segment is missing keeps an approximate span that
//! extends to the declared mate start.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{AlignedRead, Position};

/// Display color of a pair, decided once from flag and filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairColor {
    /// At least one segment failed the external record filter.
    Filtered,
    /// The mate is flagged unmapped.
    MateUnmapped,
    /// Cross-contig mate or pair not flagged proper.
    Discordant,
    /// Ordinary pair.
    Normal,
}

/// The reconstructed template: one aligned segment, optionally its mate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPair {
    r1: AlignedRead,
    r2: Option<AlignedRead>,
    // arrival rank of the founding read; orders span ties deterministically
    seq: u64,
}

impl ReadPair {
    pub fn singleton(read: AlignedRead) -> Self {
        Self {
            r1: read,
            r2: None,
            seq: 0,
        }
    }

    pub fn r1(&self) -> &AlignedRead {
        &self.r1
    }

    pub fn r2(&self) -> Option<&AlignedRead> {
        self.r2.as_ref()
    }

    pub fn contig(&self) -> &str {
        &self.r1.contig
    }

    /// Genomic start of the drawn span. Without a resolved mate the declared
    /// mate start still widens the span when the mate maps to the same contig.
    pub fn start(&self, show_clip: bool) -> Position {
        let p = self.r1.left_edge(show_clip);
        match &self.r2 {
            Some(r2) => p.min(r2.left_edge(show_clip)),
            None if self.r1.mate_on_same_contig() => p.min(self.r1.mate_start),
            None => p,
        }
    }

    pub fn end(&self, show_clip: bool) -> Position {
        let p = self.r1.right_edge(show_clip);
        match &self.r2 {
            Some(r2) => p.max(r2.right_edge(show_clip)),
            None if self.r1.mate_on_same_contig() => p.max(self.r1.mate_start),
            None => p,
        }
    }

    /// Display color from flag state; filtered segments win over everything.
    pub fn color(&self) -> PairColor {
        if self.r1.filtered {
            return PairColor::Filtered;
        }
        if self.r1.flags.paired {
            if self.r1.flags.mate_unmapped {
                return PairColor::MateUnmapped;
            }
            if self.r1.mate_contig.as_deref() != Some(self.r1.contig.as_str()) {
                return PairColor::Discordant;
            }
            if !self.r1.flags.proper_pair {
                return PairColor::Discordant;
            }
            // the mate is not necessarily fetched when it falls outside the window
            if let Some(r2) = &self.r2 {
                if r2.filtered {
                    return PairColor::Filtered;
                }
            }
        }
        PairColor::Normal
    }

    /// Position where the two mates' spans overlap, if they do. A single
    /// positional marker regardless of which mate reports it.
    pub fn merge_position(&self, show_clip: bool) -> Option<Position> {
        if !self.r1.flags.paired {
            return None;
        }
        let left1 = self.r1.left_edge(show_clip);
        let right1 = self.r1.right_edge(show_clip);
        if let Some(r2) = &self.r2 {
            let left2 = r2.left_edge(show_clip);
            if left1 <= left2 && right1 >= left2 {
                return Some(left2);
            }
        }
        if left1 <= self.r1.mate_start && right1 >= self.r1.mate_start {
            return Some(self.r1.mate_start);
        }
        None
    }

    /// Natural ordering: (contig, start, end) with display edges.
    pub fn cmp_by_span(&self, other: &Self, show_clip: bool) -> Ordering {
        self.contig()
            .cmp(other.contig())
            .then(self.start(show_clip).cmp(&other.start(show_clip)))
            .then(self.end(show_clip).cmp(&other.end(show_clip)))
    }

    /// True when every present segment failed the external filter.
    pub fn fully_filtered(&self) -> bool {
        self.r1.filtered && self.r2.as_ref().map_or(true, |r| r.filtered)
    }

    fn try_absorb(&mut self, read: &AlignedRead, show_clip: bool) -> bool {
        if self.r2.is_some() || !self.r1.flags.paired {
            return false;
        }
        // two first-of-pair or two second-of-pair segments can never be mates
        if self.r1.flags.first_of_pair && read.flags.first_of_pair {
            return false;
        }
        if self.r1.flags.second_of_pair && read.flags.second_of_pair {
            return false;
        }
        if self.r1.mate_start != read.start {
            return false;
        }
        if self.r1.mate_contig.as_deref() != Some(read.contig.as_str()) {
            return false;
        }
        // the leftmost segment becomes R1 regardless of arrival order
        if self.r1.left_edge(show_clip) < read.left_edge(show_clip) {
            self.r2 = Some(read.clone());
        } else {
            self.r2 = Some(std::mem::replace(&mut self.r1, read.clone()));
        }
        true
    }
}

/// Transient pairing state for one partition.
///
/// Lives only between routing and row packing; [`PairingSession::finish`]
/// consumes it and yields the reconstructed pairs.
#[derive(Debug, Default)]
pub struct PairingSession {
    by_name: HashMap<String, Vec<ReadPair>>,
    show_clip: bool,
    next_seq: u64,
}

impl PairingSession {
    pub fn new(show_clip: bool) -> Self {
        Self {
            by_name: HashMap::new(),
            show_clip,
            next_seq: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Add one read, merging it into an unmatched candidate when the declared
    /// mate coordinates line up. First structural match wins; no backtracking.
    pub fn push(&mut self, read: AlignedRead) {
        let key = normalize_name(&read.name).to_string();
        let candidates = self.by_name.entry(key).or_default();

        if read.flags.paired {
            for pair in candidates.iter_mut() {
                if pair.try_absorb(&read, self.show_clip) {
                    return;
                }
            }
        }
        let mut pair = ReadPair::singleton(read);
        pair.seq = self.next_seq;
        self.next_seq += 1;
        candidates.push(pair);
    }

    /// Consume the session and hand back every pair, matched or not, in
    /// arrival order.
    pub fn finish(self) -> Vec<ReadPair> {
        let mut pairs: Vec<ReadPair> = self.by_name.into_values().flatten().collect();
        pairs.sort_by_key(|p| p.seq);
        pairs
    }
}

/// Strip a trailing `/1` or `/2` mate suffix from a read name.
fn normalize_name(name: &str) -> &str {
    name.strip_suffix("/1")
        .or_else(|| name.strip_suffix("/2"))
        .unwrap_or(name)
}
