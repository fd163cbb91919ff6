//! Error taxonomy for the rendering engine
//!
//! Only whole-run preconditions are fatal. Per-read anomalies (unmatched or
//! discordant mates, mates outside the fetched window) are drawing state, and a
//! missing reference sequence merely disables the GC track.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("no partition received any data (missing read groups?)")]
    NoPartitions,
}

pub type Result<T> = std::result::Result<T, RasterError>;
