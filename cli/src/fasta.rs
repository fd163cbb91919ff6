//! Reference sequence access for the GC track

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use bamraster_core::signal::GcSource;
use bamraster_core::Position;

/// In-memory reference slice holding only the contigs a run actually needs.
pub struct FastaGc {
    by_contig: HashMap<String, Vec<u8>>,
}

impl FastaGc {
    /// Load the named contig from a FASTA file. Other contigs are skipped so
    /// a whole-genome reference never has to fit in memory at once.
    pub fn load_contig(path: &Path, contig: &str) -> Result<Self> {
        let mut reader = needletail::parse_fastx_file(path)
            .with_context(|| format!("opening FASTA {}", path.display()))?;
        let mut by_contig = HashMap::new();
        while let Some(record) = reader.next() {
            let record = record.with_context(|| format!("reading {}", path.display()))?;
            let id = record.id();
            // the record id runs up to the first whitespace of the header line
            let name = id
                .split(|b: &u8| b.is_ascii_whitespace())
                .next()
                .unwrap_or(id);
            if name == contig.as_bytes() {
                by_contig.insert(contig.to_string(), record.seq().into_owned());
                break;
            }
        }
        if by_contig.is_empty() {
            log::warn!(
                "contig {} not found in {}; GC track disabled",
                contig,
                path.display()
            );
        }
        Ok(Self { by_contig })
    }

    pub fn is_empty(&self) -> bool {
        self.by_contig.is_empty()
    }
}

impl GcSource for FastaGc {
    fn gc_fraction(&self, contig: &str, start: Position, end: Position) -> Option<f64> {
        let bases = self.by_contig.get(contig)?;
        let lo = start.max(1) as usize - 1;
        let hi = (end as usize).min(bases.len());
        if lo >= hi {
            return None;
        }
        let slice = &bases[lo..hi];
        let gc = slice
            .iter()
            .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
            .count();
        Some(gc as f64 / slice.len() as f64)
    }
}
