use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use bamraster_core::signal;
use bamraster_core::{
    pack_rows, Canvas, Color, GcSource, Interval, PartitionManager, PixelMapper, ReadPair,
    RenderConfig, RenderContext,
};

mod bam;
mod fasta;
mod genes;
mod settings;

use bam::{BamReader, RecordFilter};
use fasta::FastaGc;
use settings::Settings;

#[derive(Parser)]
#[command(name = "bamraster")]
#[command(about = "Low-resolution alignment track rendering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GroupBy {
    /// One image per sample (SM of the read group)
    Sample,
    /// One image per read group ID
    ReadGroup,
}

#[derive(Subcommand)]
enum Commands {
    /// Render alignment tracks over a genomic interval
    Raster {
        /// Indexed BAM file(s)
        #[arg(short, long, required = true)]
        bam: Vec<PathBuf>,

        /// Interval to render, e.g. "chr1:2345-6789"
        #[arg(short, long)]
        region: String,

        /// Output image (PNG); multi-partition runs insert the partition name
        #[arg(short, long)]
        output: PathBuf,

        /// Reference FASTA for the GC% track
        #[arg(short = 'R', long)]
        reference: Option<PathBuf>,

        /// UCSC genePred/refGene table for the gene track
        #[arg(short, long)]
        genes: Option<PathBuf>,

        /// Optional TOML settings file
        #[arg(long)]
        config: Option<PathBuf>,

        /// How reads are split into partitions
        #[arg(long, value_enum, default_value_t = GroupBy::Sample)]
        group_by: GroupBy,

        /// Canvas width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Minimum base gap between pairs sharing a row
        #[arg(long)]
        min_gap: Option<u64>,

        /// Row cap per partition; zero means unbounded
        #[arg(long)]
        max_rows: Option<i32>,

        /// Ignore soft/hard clips for display edges and overlays
        #[arg(long)]
        hide_clip: bool,

        /// Comma-separated positions to highlight, e.g. "2500,2600"
        #[arg(long)]
        highlight: Option<String>,

        /// Mark reads below this mapping quality as filtered
        #[arg(long, default_value_t = 0)]
        min_mapq: u8,

        /// Do not mark duplicate reads as filtered
        #[arg(long)]
        keep_duplicates: bool,

        /// Do not mark QC-fail reads as filtered
        #[arg(long)]
        keep_qc_fail: bool,

        /// Worker threads; zero uses all cores
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
    },

    /// Plot median-normalized coverage around an interval
    Coverage {
        /// Indexed BAM file(s)
        #[arg(short, long, required = true)]
        bam: Vec<PathBuf>,

        /// Interval of interest, e.g. "chr1:2345-6789"
        #[arg(short, long)]
        region: String,

        /// Output image (PNG); multiple BAMs insert the file stem
        #[arg(short, long)]
        output: PathBuf,

        /// Window extension factor around the interval
        #[arg(long, default_value_t = 2.0)]
        extend: f64,

        /// Plot width in pixels
        #[arg(long, default_value_t = 1000)]
        width: u32,

        /// Plot height in pixels
        #[arg(long, default_value_t = 300)]
        height: u32,

        /// Skip reads below this mapping quality
        #[arg(long, default_value_t = 0)]
        min_mapq: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Raster {
            bam,
            region,
            output,
            reference,
            genes,
            config,
            group_by,
            width,
            min_gap,
            max_rows,
            hide_clip,
            highlight,
            min_mapq,
            keep_duplicates,
            keep_qc_fail,
            threads,
        } => cmd_raster(RasterOptions {
            bam,
            region,
            output,
            reference,
            genes,
            config,
            group_by,
            width,
            min_gap,
            max_rows,
            hide_clip,
            highlight,
            min_mapq,
            keep_duplicates,
            keep_qc_fail,
            threads,
        }),
        Commands::Coverage {
            bam,
            region,
            output,
            extend,
            width,
            height,
            min_mapq,
        } => cmd_coverage(bam, &region, &output, extend, width, height, min_mapq),
    }
}

struct RasterOptions {
    bam: Vec<PathBuf>,
    region: String,
    output: PathBuf,
    reference: Option<PathBuf>,
    genes: Option<PathBuf>,
    config: Option<PathBuf>,
    group_by: GroupBy,
    width: Option<u32>,
    min_gap: Option<u64>,
    max_rows: Option<i32>,
    hide_clip: bool,
    highlight: Option<String>,
    min_mapq: u8,
    keep_duplicates: bool,
    keep_qc_fail: bool,
    threads: usize,
}

fn cmd_raster(opts: RasterOptions) -> Result<()> {
    if opts.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(opts.threads)
            .build_global()
            .context("initializing worker pool")?;
    }

    let mut config = RenderConfig::default();
    if let Some(path) = &opts.config {
        config = Settings::load(path)?.apply(config);
    }
    if let Some(v) = opts.width {
        config.width = v;
    }
    if let Some(v) = opts.min_gap {
        config.min_gap = v;
    }
    if let Some(v) = opts.max_rows {
        config.max_rows = v;
    }
    if opts.hide_clip {
        config.show_clip = false;
    }
    config.highlight_positions = parse_highlights(opts.highlight.as_deref())?;
    let config = config.validated();

    let mut readers = Vec::new();
    for path in &opts.bam {
        readers.push((path.clone(), BamReader::open(path)?));
    }

    let (contig, range) = parse_region(&opts.region)?;
    let interval = match range {
        Some((start, end)) => Interval::new(contig, start, end),
        None => {
            let length = readers[0]
                .1
                .contig_length(&contig)
                .ok_or_else(|| anyhow!("contig {} not found in {}", contig, opts.bam[0].display()))?;
            Interval::new(contig, 1, length)
        }
    };
    log::info!("rendering {} at {} px", interval, config.width);
    let mapper = PixelMapper::new(interval.clone(), config.width);

    let gc = match &opts.reference {
        Some(path) => {
            let source = FastaGc::load_contig(path, &interval.contig)?;
            (!source.is_empty()).then_some(source)
        }
        None => None,
    };
    let gene_models = match &opts.genes {
        Some(path) => genes::load_overlapping(path, &interval)?,
        None => Vec::new(),
    };

    let filter = RecordFilter {
        min_mapq: opts.min_mapq,
        keep_duplicates: opts.keep_duplicates,
        keep_qc_fail: opts.keep_qc_fail,
    };

    let mut manager = PartitionManager::new(config.show_clip);
    for (path, reader) in &mut readers {
        let samples = bam::sample_lookup(reader.header());
        // files without read groups pool into one partition named after them
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reads".to_string());
        let reads = reader.fetch(&interval, &filter)?;
        log::info!("{}: {} reads", path.display(), reads.len());
        for read in reads {
            let key = match opts.group_by {
                GroupBy::Sample => read
                    .read_group
                    .as_ref()
                    .and_then(|rg| samples.get(rg))
                    .cloned(),
                GroupBy::ReadGroup => read.read_group.clone(),
            };
            let key = key.or_else(|| samples.is_empty().then(|| fallback.clone()));
            manager.push(key.as_deref(), read);
        }
    }

    let ctx = RenderContext {
        config: &config,
        mapper: &mapper,
        genes: &gene_models,
        gc: gc.as_ref().map(|g| g as &dyn GcSource),
    };
    let rendered = manager.materialize(&ctx)?;

    let multi = rendered.len() > 1;
    for partition in &rendered {
        let path = partition_output(&opts.output, &partition.name, multi);
        write_png(&partition.canvas, &path)?;
        log::info!(
            "wrote {} ({}, {} rows)",
            path.display(),
            partition.name,
            partition.rows.len()
        );
    }
    Ok(())
}

fn cmd_coverage(
    bams: Vec<PathBuf>,
    region: &str,
    output: &Path,
    extend: f64,
    width: u32,
    height: u32,
    min_mapq: u8,
) -> Result<()> {
    let (contig, range) = parse_region(region)?;
    let Some((start, end)) = range else {
        bail!("coverage needs an explicit region, e.g. chr1:2345-6789");
    };
    let focus = Interval::new(contig, start, end);
    let filter = RecordFilter {
        min_mapq,
        ..RecordFilter::default()
    };

    let multi = bams.len() > 1;
    for path in &bams {
        let mut reader = BamReader::open(path)?;
        let contig_length = reader
            .contig_length(&focus.contig)
            .ok_or_else(|| anyhow!("contig {} not found in {}", focus.contig, path.display()))?;
        let extended = extend_interval(&focus, extend, contig_length);
        let mapper = PixelMapper::new(extended.clone(), width.max(1));

        let reads = reader.fetch(&extended, &filter)?;
        let pairs: Vec<ReadPair> = reads
            .into_iter()
            .filter(|r| !r.filtered)
            .map(ReadPair::singleton)
            .collect();
        let rows = pack_rows(pairs, 0, None, false);

        let coverage = signal::base_coverage(&rows, &extended);
        let half_width = (extended.len() as usize / 100).max(1);
        let smoothed = signal::smooth(&coverage, half_width);
        let median = signal::flanking_median(&smoothed, &extended, &focus);
        let normalized = signal::normalize(&smoothed, median);
        let columns = signal::bin_values(&normalized, &mapper);
        log::info!("{}: flanking median depth {:.1}", path.display(), median);

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "coverage".to_string());
        let canvas = coverage_canvas(&stem, &focus, &mapper, &columns, height.max(1), median);
        let out = partition_output(output, &stem, multi);
        write_png(&canvas, &out)?;
        log::info!("wrote {}", out.display());
    }
    Ok(())
}

/// Draw one normalized coverage panel: filled area, copy-number gridlines at
/// half-unit steps, and the boundaries of the interval of interest.
fn coverage_canvas(
    title: &str,
    focus: &Interval,
    mapper: &PixelMapper,
    columns: &[f64],
    height: u32,
    median: f64,
) -> Canvas {
    let mut canvas = Canvas::new(mapper.width(), height, Color::NEAR_WHITE);
    let th = height as f64;
    let y_max = columns.iter().fold(2.0f64, |acc, &v| acc.max(v));
    let y_of = |v: f64| th - v / y_max * th;

    let mut points: Vec<(f64, f64)> = Vec::with_capacity(columns.len() + 2);
    points.push((0.0, th));
    for (x, &v) in columns.iter().enumerate() {
        points.push((x as f64, y_of(v)));
    }
    points.push((mapper.width() as f64, th));
    canvas.fill_polygon(points, Color::GRAY);

    let mut level = 0.5;
    while level < y_max {
        let color = if (level - 1.0).abs() < 1e-9 {
            Color::RED
        } else {
            Color::DARK_GRAY
        };
        canvas.line(0.0, y_of(level), mapper.width() as f64, y_of(level), color);
        level += 0.5;
    }

    for pos in [focus.start, focus.end] {
        let x = mapper.pos_to_pixel(pos);
        canvas.line(x, 0.0, x, th, Color::BLUE);
    }

    let label = format!("{} {} median {:.1}", title, focus, median);
    canvas.text(label.clone(), 1.0, 1.0, 10, Color::NEAR_WHITE);
    canvas.text(label, 2.0, 2.0, 10, Color::NEAR_BLACK);
    canvas
}

/// Widen the interval of interest symmetrically, clamped to the contig.
fn extend_interval(focus: &Interval, factor: f64, contig_length: u64) -> Interval {
    let extra = ((factor - 1.0).max(0.0) * focus.len() as f64 / 2.0) as u64;
    let start = focus.start.saturating_sub(extra).max(1);
    let end = (focus.end + extra).min(contig_length.max(focus.end));
    Interval::new(focus.contig.clone(), start, end)
}

/// Parse "contig:start-end" (commas allowed in numbers) or a bare contig name.
fn parse_region(spec: &str) -> Result<(String, Option<(u64, u64)>)> {
    if !spec.contains(':') {
        return Ok((spec.to_string(), None));
    }
    let interval: Interval = spec.parse()?;
    Ok((interval.contig, Some((interval.start, interval.end))))
}

fn parse_highlights(spec: Option<&str>) -> Result<std::collections::BTreeSet<u64>> {
    let mut positions = std::collections::BTreeSet::new();
    if let Some(spec) = spec {
        for token in spec.split(',').filter(|t| !t.is_empty()) {
            let pos: u64 = token
                .parse()
                .with_context(|| format!("bad highlight position {:?}", token))?;
            positions.insert(pos);
        }
    }
    Ok(positions)
}

/// Per-partition output path: `out.png` stays as is for a single partition,
/// otherwise becomes `out.NAME.png`.
fn partition_output(base: &Path, name: &str, multi: bool) -> PathBuf {
    if !multi {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("raster");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("png");
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    base.with_file_name(format!("{}.{}.{}", stem, safe, ext))
}

fn write_png(canvas: &Canvas, path: &Path) -> Result<()> {
    let image = image::RgbImage::from_raw(canvas.width(), canvas.height(), canvas.rasterize())
        .ok_or_else(|| anyhow!("canvas buffer does not match its dimensions"))?;
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_with_range() {
        let (contig, range) = parse_region("chr1:2,345-6,789").unwrap();
        assert_eq!(contig, "chr1");
        assert_eq!(range, Some((2345, 6789)));
    }

    #[test]
    fn test_parse_region_bare_contig() {
        let (contig, range) = parse_region("chrM").unwrap();
        assert_eq!(contig, "chrM");
        assert_eq!(range, None);
    }

    #[test]
    fn test_parse_region_rejects_bad_ranges() {
        assert!(parse_region("chr1:0-100").is_err());
        assert!(parse_region("chr1:500-100").is_err());
        assert!(parse_region("chr1:abc-def").is_err());
    }

    #[test]
    fn test_parse_highlights() {
        let positions = parse_highlights(Some("100,200,150")).unwrap();
        assert_eq!(positions.into_iter().collect::<Vec<_>>(), vec![100, 150, 200]);
        assert!(parse_highlights(None).unwrap().is_empty());
        assert!(parse_highlights(Some("12x")).is_err());
    }

    #[test]
    fn test_extend_interval_clamps_to_contig() {
        let focus = Interval::new("chr1", 100, 199);
        let extended = extend_interval(&focus, 3.0, 260);
        assert_eq!(extended.start, 1);
        assert_eq!(extended.end, 260);

        let unextended = extend_interval(&focus, 1.0, 1000);
        assert_eq!((unextended.start, unextended.end), (100, 199));
    }

    #[test]
    fn test_partition_output_naming() {
        let base = Path::new("/tmp/out.png");
        assert_eq!(partition_output(base, "s1", false), base);
        assert_eq!(
            partition_output(base, "sample one", true),
            Path::new("/tmp/out.sample_one.png")
        );
    }
}
