//! Indexed BAM access and record conversion
//!
//! Fetches use the `.bai` companion index next to the BAM. Records come back
//! converted into the engine's alignment type; secondary and supplementary
//! records never reach the caller, while records failing the soft filter are
//! kept but marked so they draw in the filtered color.

use std::ffi::OsString;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bstr::ByteSlice;
use noodles::bam;
use noodles::bgzf;
use noodles::core::Position as SamPosition;
use noodles::csi::{self, BinningIndex};
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::Record as _;
use noodles::sam::alignment::record::data::field::{Tag, Value};
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::sam::Header;

use bamraster_core::{AlignedRead, CigarOp, CigarOpKind, Interval, ReadFlags, Strand};

/// Soft filter applied to fetched records. Failing reads stay in the output
/// with their `filtered` mark set; they are never silently dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub min_mapq: u8,
    pub keep_duplicates: bool,
    pub keep_qc_fail: bool,
}

impl RecordFilter {
    fn fails(&self, record: &bam::Record) -> bool {
        let flags = record.flags();
        if !self.keep_duplicates && flags.is_duplicate() {
            return true;
        }
        if !self.keep_qc_fail && flags.is_qc_fail() {
            return true;
        }
        let mapq = record.mapping_quality().map(|q| q.get()).unwrap_or(0);
        mapq < self.min_mapq
    }
}

pub struct BamReader {
    reader: bam::io::Reader<bgzf::Reader<File>>,
    index: bam::bai::Index,
    header: Header,
}

impl BamReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut index_path = OsString::from(path.as_os_str());
        index_path.push(".bai");
        let index = bam::bai::read(&index_path).with_context(|| {
            format!("reading BAM index {}", Path::new(&index_path).display())
        })?;

        let file =
            File::open(path).with_context(|| format!("opening BAM {}", path.display()))?;
        let mut reader = bam::io::Reader::new(file);
        let header = reader
            .read_header()
            .with_context(|| format!("reading BAM header of {}", path.display()))?;
        Ok(Self {
            reader,
            index,
            header,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Declared length of a contig, for clamping extended windows.
    pub fn contig_length(&self, contig: &str) -> Option<u64> {
        self.header
            .reference_sequences()
            .get(contig.as_bytes())
            .map(|seq| usize::from(seq.length()) as u64)
    }

    /// Fetch every mapped primary record overlapping the interval.
    pub fn fetch(
        &mut self,
        interval: &Interval,
        filter: &RecordFilter,
    ) -> Result<Vec<AlignedRead>> {
        let reference_sequence_id = self
            .header
            .reference_sequences()
            .get_index_of(interval.contig.as_bytes())
            .ok_or_else(|| anyhow!("contig {} not found in BAM header", interval.contig))?;

        let start = SamPosition::try_from(interval.start as usize)
            .map_err(|_| anyhow!("invalid interval start {}", interval.start))?;
        let end = SamPosition::try_from(interval.end as usize)
            .map_err(|_| anyhow!("invalid interval end {}", interval.end))?;
        let query_interval = noodles::core::region::Interval::from(start..=end);

        let chunks = self.index.query(reference_sequence_id, query_interval)?;
        let header = &self.header;
        let mut query =
            bam::io::Reader::from(csi::io::Query::new(self.reader.get_mut(), chunks));

        let mut reads = Vec::new();
        let mut record = bam::Record::default();
        while query.read_record(&mut record)? > 0 {
            let flags = record.flags();
            if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() {
                continue;
            }
            if record.reference_sequence_id().transpose()? != Some(reference_sequence_id) {
                continue;
            }
            let (Some(record_start), Some(record_end)) = (
                record.alignment_start().transpose()?,
                record.alignment_end().transpose()?,
            ) else {
                continue;
            };
            let record_interval =
                noodles::core::region::Interval::from(record_start..=record_end);
            if !query_interval.intersects(record_interval) {
                continue;
            }
            if let Some(read) = Self::convert(header, &record)? {
                reads.push(read.with_filtered(filter.fails(&record)));
            }
        }
        log::debug!("fetched {} reads overlapping {}", reads.len(), interval);
        Ok(reads)
    }

    fn convert(header: &Header, record: &bam::Record) -> Result<Option<AlignedRead>> {
        let Some(name) = record.name().map(|n| n.to_str_lossy().into_owned()) else {
            log::debug!("skipping unnamed record");
            return Ok(None);
        };
        let Some(start) = record.alignment_start().transpose()? else {
            return Ok(None);
        };

        let mut cigar = Vec::new();
        for op in record.cigar().iter() {
            let op = op?;
            cigar.push(CigarOp::new(convert_kind(op.kind()), op.len() as u32));
        }

        let flags = record.flags();
        let read_flags = ReadFlags {
            paired: flags.is_segmented(),
            proper_pair: flags.is_properly_segmented(),
            mate_unmapped: flags.is_mate_unmapped(),
            first_of_pair: flags.is_first_segment(),
            second_of_pair: flags.is_last_segment(),
            duplicate: flags.is_duplicate(),
            secondary: flags.is_secondary(),
            supplementary: flags.is_supplementary(),
            qc_fail: flags.is_qc_fail(),
        };
        let strand = if flags.is_reverse_complemented() {
            Strand::Reverse
        } else {
            Strand::Forward
        };

        let contig = Self::reference_name(header, record.reference_sequence_id().transpose()?)
            .ok_or_else(|| anyhow!("record {} has no reference sequence", name))?;
        let mate_contig =
            Self::reference_name(header, record.mate_reference_sequence_id().transpose()?);
        let mate_start = record
            .mate_alignment_start()
            .transpose()?
            .map(|p| usize::from(p) as u64)
            .unwrap_or(0);

        let read = AlignedRead::new(
            name,
            contig,
            usize::from(start) as u64,
            cigar,
            strand,
            read_flags,
            mate_contig,
            mate_start,
        );
        Ok(Some(match read_group_id(record)? {
            Some(rg) => read.with_read_group(rg),
            None => read,
        }))
    }

    fn reference_name(header: &Header, id: Option<usize>) -> Option<String> {
        let (name, _) = header.reference_sequences().get_index(id?)?;
        Some(name.to_string())
    }
}

fn convert_kind(kind: Kind) -> CigarOpKind {
    match kind {
        Kind::Match => CigarOpKind::Match,
        Kind::Insertion => CigarOpKind::Insertion,
        Kind::Deletion => CigarOpKind::Deletion,
        Kind::Skip => CigarOpKind::Skip,
        Kind::SoftClip => CigarOpKind::SoftClip,
        Kind::HardClip => CigarOpKind::HardClip,
        Kind::Pad => CigarOpKind::Pad,
        Kind::SequenceMatch => CigarOpKind::SequenceMatch,
        Kind::SequenceMismatch => CigarOpKind::SequenceMismatch,
    }
}

fn read_group_id(record: &bam::Record) -> Result<Option<String>> {
    match record.data().get(&Tag::READ_GROUP).transpose()? {
        Some(Value::String(s)) => Ok(Some(s.to_string())),
        _ => Ok(None),
    }
}

/// Map every read group ID declared in the header to its sample name (SM).
/// Read groups without a sample fall back to their own ID.
pub fn sample_lookup(header: &Header) -> std::collections::HashMap<String, String> {
    let mut lookup = std::collections::HashMap::new();
    for (id, rg) in header.read_groups() {
        let sample = rg
            .other_fields()
            .get(&rg_tag::SAMPLE)
            .map(|s| s.to_string())
            .unwrap_or_else(|| id.to_string());
        lookup.insert(id.to_string(), sample);
    }
    lookup
}
