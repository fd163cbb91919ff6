//! Gene model loading from UCSC genePred tables
//!
//! Accepts both the refGene flavor (leading numeric bin column) and the plain
//! ten-column genePred layout. Table coordinates are 0-based half-open and
//! are converted to the engine's 1-based inclusive convention on load.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bamraster_core::{GeneModel, Interval, Strand};

pub fn load_overlapping(path: &Path, interval: &Interval) -> Result<Vec<GeneModel>> {
    let file =
        File::open(path).with_context(|| format!("opening gene table {}", path.display()))?;
    let mut genes = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (chrom, gene) = parse_line(&line)
            .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
        if chrom == interval.contig && gene.tx_start <= interval.end && gene.tx_end >= interval.start
        {
            genes.push(gene);
        }
    }
    // top-to-bottom lanes in transcript order
    genes.sort_by(|a, b| (a.tx_start, a.tx_end).cmp(&(b.tx_start, b.tx_end)));
    log::info!("loaded {} gene models overlapping {}", genes.len(), interval);
    Ok(genes)
}

fn parse_line(line: &str) -> Result<(String, GeneModel)> {
    let mut fields: Vec<&str> = line.split('\t').collect();
    // refGene carries a numeric bin as its first column; genePred does not
    if fields.first().map_or(false, |f| f.parse::<u32>().is_ok()) {
        fields.remove(0);
    }
    if fields.len() < 10 {
        return Err(anyhow!("expected at least 10 genePred columns"));
    }

    let name = fields[0].to_string();
    let chrom = fields[1].to_string();
    let strand = match fields[2] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        other => return Err(anyhow!("bad strand {:?}", other)),
    };
    let tx_start: u64 = fields[3].parse()?;
    let tx_end: u64 = fields[4].parse()?;
    let cds_start: u64 = fields[5].parse()?;
    let cds_end: u64 = fields[6].parse()?;
    let exon_starts = parse_offsets(fields[8])?;
    let exon_ends = parse_offsets(fields[9])?;
    if exon_starts.len() != exon_ends.len() {
        return Err(anyhow!("exon start/end count mismatch"));
    }

    // the display name (name2) sits after the exon frames when present
    let display = fields
        .get(11)
        .filter(|s| !s.is_empty())
        .map_or(name, |s| s.to_string());

    let exons = exon_starts
        .into_iter()
        .zip(exon_ends)
        .map(|(s, e)| (s + 1, e))
        .collect();
    let gene = GeneModel {
        name: display,
        strand,
        tx_start: tx_start + 1,
        tx_end,
        cds_start: cds_start + 1,
        cds_end,
        exons,
    };
    Ok((chrom, gene))
}

fn parse_offsets(field: &str) -> Result<Vec<u64>> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REFGENE_LINE: &str = "585\tNM_001\tchr1\t+\t1000\t2000\t1100\t1900\t2\t1000,1500,\t1200,2000,\t0\tGENE1\tcmpl\tcmpl\t0,1,";

    #[test]
    fn test_parse_refgene_line() {
        let (chrom, gene) = parse_line(REFGENE_LINE).unwrap();
        assert_eq!(chrom, "chr1");
        assert_eq!(gene.name, "GENE1");
        assert_eq!(gene.strand, Strand::Forward);
        // half-open table coordinates become 1-based inclusive
        assert_eq!(gene.tx_start, 1001);
        assert_eq!(gene.tx_end, 2000);
        assert_eq!(gene.cds_start, 1101);
        assert_eq!(gene.cds_end, 1900);
        assert_eq!(gene.exons, vec![(1001, 1200), (1501, 2000)]);
        assert!(gene.is_coding());
    }

    #[test]
    fn test_parse_plain_genepred_line() {
        let line = "NR_046018\tchr1\t-\t11873\t14409\t14409\t14409\t3\t11873,12612,13220,\t12227,12721,14409,";
        let (chrom, gene) = parse_line(line).unwrap();
        assert_eq!(chrom, "chr1");
        assert_eq!(gene.name, "NR_046018");
        assert_eq!(gene.strand, Strand::Reverse);
        // cdsStart == cdsEnd marks a non-coding transcript
        assert!(!gene.is_coding());
    }

    #[test]
    fn test_load_filters_by_interval() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "{}", REFGENE_LINE).unwrap();
        writeln!(f, "585\tNM_002\tchr2\t+\t1000\t2000\t1000\t2000\t1\t1000,\t2000,\t0\tOTHER\tcmpl\tcmpl\t0,").unwrap();
        f.as_file().sync_all().unwrap();

        let hit = load_overlapping(f.path(), &Interval::new("chr1", 1500, 1600)).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "GENE1");

        let miss = load_overlapping(f.path(), &Interval::new("chr1", 5000, 6000)).unwrap();
        assert!(miss.is_empty());
    }
}
