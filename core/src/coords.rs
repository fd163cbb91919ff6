//! Genomic intervals and the genomic-position <-> pixel-column mapping

use std::fmt;
use std::str::FromStr;

use crate::error::RasterError;
use crate::types::Position;

/// A 1-based inclusive genomic interval on a single contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    pub contig: String,
    pub start: Position,
    pub end: Position,
}

impl Interval {
    pub fn new(contig: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            contig: contig.into(),
            start,
            end: end.max(start),
        }
    }

    /// Length on the reference, never below 1.
    pub fn len(&self) -> u64 {
        (self.end + 1).saturating_sub(self.start).max(1)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn overlaps(&self, contig: &str, start: Position, end: Position) -> bool {
        self.contig == contig && self.start <= end && start <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

/// Parses `contig:start-end` with 1-based inclusive coordinates. Thousands
/// separators in the numbers are accepted.
impl FromStr for Interval {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RasterError::InvalidInterval(s.to_string());
        let (contig, range) = s.rsplit_once(':').ok_or_else(invalid)?;
        let range = range.replace(',', "");
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;
        let start: Position = start.parse().map_err(|_| invalid())?;
        let end: Position = end.parse().map_err(|_| invalid())?;
        if contig.is_empty() || start == 0 || end < start {
            return Err(invalid());
        }
        Ok(Interval::new(contig, start, end))
    }
}

/// Bidirectional linear mapping between genomic positions and pixel columns.
///
/// Built once per run and shared read-only by every component. The interval
/// length is clamped to at least one base so the scale never divides by zero.
#[derive(Debug, Clone)]
pub struct PixelMapper {
    interval: Interval,
    width: u32,
}

impl PixelMapper {
    pub fn new(interval: Interval, width: u32) -> Self {
        Self { interval, width }
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pixel column of a genomic position. Positions outside the interval map
    /// beyond the canvas edges; callers clip when drawing.
    pub fn pos_to_pixel(&self, pos: Position) -> f64 {
        let offset = pos as f64 - self.interval.start as f64;
        offset * self.width as f64 / self.interval.len() as f64
    }

    /// Genomic position of a pixel column, the inverse of [`pos_to_pixel`].
    ///
    /// [`pos_to_pixel`]: PixelMapper::pos_to_pixel
    pub fn pixel_to_pos(&self, x: u32) -> Position {
        let frac = x as f64 / self.width as f64;
        self.interval.start + (frac * self.interval.len() as f64) as u64
    }

    /// Genomic width of one pixel column, in bases.
    pub fn bases_per_pixel(&self) -> f64 {
        self.interval.len() as f64 / self.width as f64
    }
}
