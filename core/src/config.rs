//! Validated render configuration
//!
//! All clamping happens here, at construction time. Nothing mutates the
//! configuration once a run has started.

use std::collections::BTreeSet;

use crate::types::Position;

/// Lower bound for the canvas width in pixels.
pub const MIN_WIDTH: u32 = 100;

/// Fallback GC window size in bases when the configured value is unusable.
pub const DEFAULT_GC_WINDOW: u64 = 5;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Canvas width in pixels, shared by every partition image.
    pub width: u32,
    /// Minimum separation between two pairs sharing a row, in bases.
    pub min_gap: u64,
    /// Maximum number of alignment rows; zero or negative means unbounded.
    pub max_rows: i32,
    /// Height of one feature lane in pixels.
    pub feature_height: u32,
    /// Vertical spacing between sub-tracks in pixels.
    pub spacing: u32,
    /// Narrowest glyph still drawn with a strand chevron, in pixels.
    pub min_arrow_width: u32,
    /// Coverage histogram height in pixels; zero disables the track.
    pub depth_track_height: u32,
    /// GC% histogram height in pixels; zero disables the track.
    pub gc_track_height: u32,
    /// Window added on both sides of a column when sampling GC content.
    pub gc_window: u64,
    /// Draw soft/hard-clip and mismatch overlays, and use unclipped bounds
    /// for display edges.
    pub show_clip: bool,
    /// Genomic positions highlighted with a background band.
    pub highlight_positions: BTreeSet<Position>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            min_gap: 10,
            max_rows: 0,
            feature_height: 5,
            spacing: 1,
            min_arrow_width: 3,
            depth_track_height: 100,
            gc_track_height: 100,
            gc_window: 10,
            show_clip: true,
            highlight_positions: BTreeSet::new(),
        }
    }
}

impl RenderConfig {
    /// Clamp out-of-range settings, logging every correction.
    pub fn validated(mut self) -> Self {
        if self.width < MIN_WIDTH {
            log::info!("adjusting width from {} to {}", self.width, MIN_WIDTH);
            self.width = MIN_WIDTH;
        }
        if self.gc_window == 0 {
            log::info!("adjusting GC window size to {}", DEFAULT_GC_WINDOW);
            self.gc_window = DEFAULT_GC_WINDOW;
        }
        if self.feature_height == 0 {
            self.feature_height = 1;
        }
        self
    }

    /// Row cap as an Option; `None` means unbounded.
    pub fn row_cap(&self) -> Option<usize> {
        if self.max_rows <= 0 {
            None
        } else {
            Some(self.max_rows as usize)
        }
    }
}
