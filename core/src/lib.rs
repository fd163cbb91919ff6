//! BamRaster Core Library
//!
//! Coordinate mapping, mate pairing, row packing, signal aggregation and the
//! track compositor for low-resolution alignment rasters.

pub mod config;
pub mod coords;
pub mod error;
pub mod pair;
pub mod partition;
pub mod raster;
pub mod rows;
pub mod signal;
pub mod track;
pub mod types;

// Re-export commonly used types and functions
pub use config::RenderConfig;
pub use coords::{Interval, PixelMapper};
pub use error::{RasterError, Result};
pub use pair::{PairColor, PairingSession, ReadPair};
pub use partition::{PartitionManager, RenderContext, RenderedPartition};
pub use raster::{Canvas, Color, DrawOp};
pub use rows::{pack_rows, Row};
pub use signal::GcSource;
pub use types::{AlignedRead, CigarOp, CigarOpKind, GeneModel, Position, ReadFlags, Strand};

/// Version information for the BamRaster core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
