//! Sub-track compositing
//!
//! Renders one partition onto a single canvas as a fixed vertical stack:
//! title, interval label, highlight bands, ruler, gene models, coverage
//! histogram, GC% histogram, then one lane per packed row. Every iteration
//! order is fixed, so identical input renders byte-identical output.

use std::collections::BTreeSet;

use crate::config::RenderConfig;
use crate::coords::PixelMapper;
use crate::pair::{PairColor, ReadPair};
use crate::raster::{Canvas, Color};
use crate::rows::Row;
use crate::types::{CigarOpKind, GeneModel, Position, Strand};

/// Read-only drawing context shared by every partition.
pub struct TrackContext<'a> {
    pub config: &'a RenderConfig,
    pub mapper: &'a PixelMapper,
    pub genes: &'a [GeneModel],
}

/// Canvas height for the given row and curve counts, before drawing.
fn canvas_height(ctx: &TrackContext<'_>, n_rows: usize, has_gc: bool) -> u32 {
    let cfg = ctx.config;
    let fh = cfg.feature_height;
    let sp = cfg.spacing;
    let mut height = 0u32;
    height += fh * 2 + sp; // title
    height += fh * 2 + sp; // interval label
    height += ruler_height(ctx) + sp;
    height += ctx.genes.len() as u32 * (fh + sp);
    if cfg.depth_track_height > 0 {
        height += cfg.depth_track_height + sp;
    }
    if cfg.gc_track_height > 0 && has_gc {
        height += cfg.gc_track_height + sp;
    }
    height += n_rows as u32 * (fh + sp);
    height
}

fn ruler_height(ctx: &TrackContext<'_>) -> u32 {
    let label = format_thousands(ctx.mapper.interval().end);
    label.len() as u32 * ctx.config.feature_height
}

/// Group digits with commas, e.g. `1234567` -> `1,234,567`.
fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn pair_color(color: PairColor) -> Color {
    match color {
        PairColor::Filtered => Color::PINK,
        PairColor::MateUnmapped => Color::RED,
        PairColor::Discordant => Color::ORANGE,
        PairColor::Normal => Color::GRAY,
    }
}

/// Compose one partition image.
///
/// `depth_columns` and `gc_columns` are the binned curves from the signal
/// aggregator; a `None` GC curve (no reference sequence) leaves the GC track
/// out entirely.
pub fn compose(
    partition_name: &str,
    rows: &[Row],
    depth_columns: &[f64],
    gc_columns: Option<&[f64]>,
    ctx: &TrackContext<'_>,
) -> Canvas {
    let cfg = ctx.config;
    let mapper = ctx.mapper;
    let interval = mapper.interval();
    let fh = cfg.feature_height as f64;
    let sp = cfg.spacing as f64;

    let has_gc = gc_columns.is_some();
    let height = canvas_height(ctx, rows.len(), has_gc);
    let mut canvas = Canvas::new(cfg.width, height, Color::NEAR_WHITE);
    let mut y = 0f64;

    // title
    canvas.text(partition_name, 1.0, y, cfg.feature_height * 2, Color::NEAR_BLACK);
    y += fh * 2.0 + sp;

    // interval label
    canvas.text(
        interval.to_string(),
        1.0,
        y,
        cfg.feature_height * 2,
        Color::NEAR_BLACK,
    );
    y += fh * 2.0 + sp;

    // highlight backgrounds run from below the labels to the canvas bottom
    for &pos in &cfg.highlight_positions {
        let x0 = mapper.pos_to_pixel(pos);
        let w = (mapper.pos_to_pixel(pos + 1) - x0).max(1.0);
        canvas.fill_rect(x0, y, w, height as f64, Color::PINK);
    }

    draw_ruler(&mut canvas, ctx, &mut y);

    for gene in ctx.genes {
        draw_gene(&mut canvas, ctx, gene, y);
        y += fh + sp;
    }

    if cfg.depth_track_height > 0 {
        draw_area_track(
            &mut canvas,
            cfg.width,
            y,
            cfg.depth_track_height,
            depth_columns,
            Color::BLUE,
            &depth_label(depth_columns),
        );
        y += cfg.depth_track_height as f64 + sp;
    }

    if let Some(gc) = gc_columns {
        if cfg.gc_track_height > 0 {
            // GC values are already in [0,1]
            draw_unit_area_track(
                &mut canvas,
                cfg.width,
                y,
                cfg.gc_track_height,
                gc,
                Color::CYAN,
                "GC%",
            );
            y += cfg.gc_track_height as f64 + sp;
        }
    }

    for row in rows {
        for pair in row.pairs() {
            draw_pair(&mut canvas, ctx, pair, y);
        }
        y += fh + sp;
    }

    canvas
}

fn draw_ruler(canvas: &mut Canvas, ctx: &TrackContext<'_>, y: &mut f64) {
    let cfg = ctx.config;
    let mapper = ctx.mapper;
    let interval = mapper.interval();
    let height = ruler_height(ctx) as f64;

    let shift = interval.len() / 10;
    let mut tick = interval.start - if shift == 0 { 0 } else { interval.start % shift };
    while tick < interval.end {
        tick += shift;
        let x = mapper.pos_to_pixel(tick);
        canvas.line(x, *y, x, canvas.height() as f64, Color::GRAY);
        canvas.text_rotated(
            format_thousands(tick),
            mapper.pos_to_pixel(tick + 1),
            *y,
            cfg.feature_height * 2,
            Color::NEAR_BLACK,
        );
        if shift == 0 {
            break;
        }
    }
    *y += height + cfg.spacing as f64;
}

fn draw_gene(canvas: &mut Canvas, ctx: &TrackContext<'_>, gene: &GeneModel, y: f64) {
    let mapper = ctx.mapper;
    let fh = ctx.config.feature_height as f64;
    let block_h = fh * 0.9;
    let mid_y = y + block_h / 2.0;

    canvas.line(
        mapper.pos_to_pixel(gene.tx_start),
        mid_y,
        mapper.pos_to_pixel(gene.tx_end),
        mid_y,
        Color::NEAR_BLACK,
    );

    // direction ticks every 30 px along the backbone
    let tick = 2.0;
    let mut pix_x = 0u32;
    while pix_x < ctx.config.width {
        let pos = mapper.pixel_to_pos(pix_x);
        if pos > gene.tx_end {
            break;
        }
        if pos >= gene.tx_start {
            let x = pix_x as f64;
            match gene.strand {
                Strand::Forward => {
                    canvas.line(x - tick, mid_y - tick, x, mid_y, Color::NEAR_BLACK);
                    canvas.line(x - tick, mid_y + tick, x, mid_y, Color::NEAR_BLACK);
                }
                Strand::Reverse => {
                    canvas.line(x + tick, mid_y - tick, x, mid_y, Color::NEAR_BLACK);
                    canvas.line(x + tick, mid_y + tick, x, mid_y, Color::NEAR_BLACK);
                }
            }
        }
        pix_x += 30;
    }

    // exon blocks, slimmer than the coding stretch
    let exon_h = block_h * 0.6;
    let exon_y = y + (block_h - exon_h) / 2.0;
    for &(start, end) in &gene.exons {
        let x0 = mapper.pos_to_pixel(start);
        let x1 = mapper.pos_to_pixel(end);
        canvas.fill_rect(x0, exon_y, (x1 - x0).max(1.0), exon_h, Color::NEAR_BLACK);
    }

    if gene.is_coding() {
        let x0 = mapper.pos_to_pixel(gene.cds_start);
        let x1 = mapper.pos_to_pixel(gene.cds_end);
        canvas.fill_rect(x0, y, (x1 - x0).max(1.0), block_h, Color::NEAR_BLACK);
    }
}

fn depth_label(columns: &[f64]) -> String {
    let min = columns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if columns.is_empty() {
        "Depth [0 - 0]".to_string()
    } else {
        format!("Depth [{} - {}]", min as i64, max as i64)
    }
}

/// Filled area plot scaled between the column minimum and maximum.
fn draw_area_track(
    canvas: &mut Canvas,
    width: u32,
    y: f64,
    track_height: u32,
    columns: &[f64],
    fill: Color,
    label: &str,
) {
    let th = track_height as f64;
    let min = columns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if columns.is_empty() || max <= min {
        1.0
    } else {
        max - min
    };

    let mut points: Vec<(f64, f64)> = Vec::with_capacity(columns.len() + 2);
    points.push((0.0, y + th));
    for (x, &value) in columns.iter().enumerate() {
        let h = (value - min) / span * th;
        points.push((x as f64, y + th - h));
    }
    points.push((width as f64, y + th));
    outline(canvas, &points);
    canvas.fill_polygon(points, fill);

    draw_shadowed_label(canvas, label, y + th - 10.0);
}

/// Filled area plot over values already in [0, 1].
fn draw_unit_area_track(
    canvas: &mut Canvas,
    width: u32,
    y: f64,
    track_height: u32,
    columns: &[f64],
    fill: Color,
    label: &str,
) {
    let th = track_height as f64;
    let mut points: Vec<(f64, f64)> = Vec::with_capacity(columns.len() + 2);
    points.push((0.0, y + th));
    for (x, &value) in columns.iter().enumerate() {
        points.push((x as f64, y + th - value * th));
    }
    points.push((width as f64, y + th));
    outline(canvas, &points);
    canvas.fill_polygon(points, fill);

    draw_shadowed_label(canvas, label, y + th - 10.0);
}

fn outline(canvas: &mut Canvas, points: &[(f64, f64)]) {
    for window in points.windows(2) {
        canvas.line(
            window[0].0,
            window[0].1,
            window[1].0,
            window[1].1,
            Color::NEAR_BLACK,
        );
    }
}

// label drawn twice with a one-pixel offset for contrast on any background
fn draw_shadowed_label(canvas: &mut Canvas, label: &str, y: f64) {
    canvas.text(label, 1.0, y, 10, Color::NEAR_WHITE);
    canvas.text(label, 2.0, y + 1.0, 10, Color::NEAR_BLACK);
}

fn draw_pair(canvas: &mut Canvas, ctx: &TrackContext<'_>, pair: &ReadPair, y: f64) {
    let cfg = ctx.config;
    let mapper = ctx.mapper;
    let show_clip = cfg.show_clip;
    let fh = cfg.feature_height as f64;
    let y0 = y;
    let y1 = y + fh;
    let y_mid = y + fh / 2.0;
    let color = pair_color(pair.color());

    canvas.line(
        mapper.pos_to_pixel(pair.start(show_clip)),
        y_mid,
        mapper.pos_to_pixel(pair.end(show_clip)),
        y_mid,
        color,
    );

    // insertion markers are positional, shared by both mates
    let mut insertions: BTreeSet<Position> = BTreeSet::new();
    for read in [Some(pair.r1()), pair.r2()].into_iter().flatten() {
        let mut refpos = read.start;
        for op in &read.cigar {
            if op.kind == CigarOpKind::Insertion {
                insertions.insert(refpos);
            }
            if op.kind.consumes_reference() {
                refpos += op.len as u64;
            }
        }
    }

    for read in [Some(pair.r1()), pair.r2()].into_iter().flatten() {
        let x0 = mapper.pos_to_pixel(read.left_edge(show_clip));
        let x1 = mapper.pos_to_pixel(read.right_edge(show_clip));

        if x1 - x0 < cfg.min_arrow_width as f64 {
            canvas.fill_rect(x0, y0, x1 - x0, fh, color);
        } else {
            let arrow = cfg.min_arrow_width as f64;
            let points = match read.strand {
                Strand::Forward => vec![
                    (x0, y0),
                    (x1 - arrow, y0),
                    (x1, y_mid),
                    (x1 - arrow, y1),
                    (x0, y1),
                ],
                Strand::Reverse => vec![
                    (x0 + arrow, y0),
                    (x0, y_mid),
                    (x0 + arrow, y1),
                    (x1, y1),
                    (x1, y0),
                ],
            };
            canvas.fill_polygon(points, color);
        }

        if show_clip {
            let mut refpos = read.unclipped_start();
            for op in &read.cigar {
                if op.kind.is_clip() || op.kind == CigarOpKind::SequenceMismatch {
                    let cx0 = mapper.pos_to_pixel(refpos);
                    let cx1 = mapper.pos_to_pixel(refpos + op.len as u64);
                    let overlay = if op.kind == CigarOpKind::SequenceMismatch {
                        Color::MAGENTA
                    } else {
                        Color::YELLOW
                    };
                    canvas.fill_rect(cx0, y0, cx1 - cx0, fh, overlay);
                }
                if op.kind.consumes_reference() || op.kind.is_clip() {
                    refpos += op.len as u64;
                }
            }
        }
    }

    if let Some(pos) = pair.merge_position(show_clip) {
        canvas.fill_rect(mapper.pos_to_pixel(pos), y0, 2.0, fh, Color::RED);
    }
    for pos in insertions {
        canvas.fill_rect(mapper.pos_to_pixel(pos), y0, 2.0, fh, Color::RED);
    }
}
