//! Partition routing and parallel materialization
//!
//! Every read is routed to exactly one partition by a caller-supplied key
//! (sample, read group, or a single fixed bucket). Partitions are fully
//! independent after routing, so materialization fans out with rayon; the
//! output order follows the partition key order, not completion order.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::RenderConfig;
use crate::coords::PixelMapper;
use crate::error::{RasterError, Result};
use crate::pair::PairingSession;
use crate::raster::Canvas;
use crate::rows::Row;
use crate::signal::{self, GcSource};
use crate::track::{self, TrackContext};
use crate::types::{AlignedRead, GeneModel};

/// Everything a partition needs to render, shared across all of them.
pub struct RenderContext<'a> {
    pub config: &'a RenderConfig,
    pub mapper: &'a PixelMapper,
    pub genes: &'a [GeneModel],
    pub gc: Option<&'a dyn GcSource>,
}

/// One finished partition: its image plus the curves that shaped it.
pub struct RenderedPartition {
    pub name: String,
    pub canvas: Canvas,
    pub rows: Vec<Row>,
    pub depth_columns: Vec<f64>,
    pub gc_columns: Option<Vec<f64>>,
}

/// Accumulates reads per partition during the fetch phase.
pub struct PartitionManager {
    sessions: BTreeMap<String, PairingSession>,
    show_clip: bool,
}

impl PartitionManager {
    pub fn new(show_clip: bool) -> Self {
        Self {
            sessions: BTreeMap::new(),
            show_clip,
        }
    }

    /// Route one read. Reads without a partition key are dropped; a read
    /// group the header never declared is not worth a partition of its own.
    pub fn push(&mut self, key: Option<&str>, read: AlignedRead) {
        let Some(key) = key else {
            log::debug!("dropping read {} without a partition key", read.name);
            return;
        };
        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| PairingSession::new(self.show_clip))
            .push(read);
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn partition_names(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }

    /// Pack, aggregate and draw every partition.
    ///
    /// Fails only when no read was routed anywhere; a partition whose every
    /// pair was dropped still yields an image with header tracks only.
    pub fn materialize(self, ctx: &RenderContext<'_>) -> Result<Vec<RenderedPartition>> {
        if self.sessions.is_empty() {
            return Err(RasterError::NoPartitions);
        }
        let show_clip = self.show_clip;
        let batches: Vec<(String, Vec<crate::pair::ReadPair>)> = self
            .sessions
            .into_iter()
            .map(|(name, session)| (name, session.finish()))
            .collect();

        let rendered = batches
            .into_par_iter()
            .map(|(name, pairs)| {
                let config = ctx.config;
                let rows = crate::rows::pack_rows(
                    pairs,
                    config.min_gap,
                    config.row_cap(),
                    show_clip,
                );
                log::info!("partition {}: {} rows", name, rows.len());

                let coverage = signal::base_coverage(&rows, ctx.mapper.interval());
                let depth_columns = signal::bin_columns(&coverage, ctx.mapper);
                let gc_columns = ctx
                    .gc
                    .and_then(|source| signal::gc_curve(ctx.mapper, source, config.gc_window));

                let track_ctx = TrackContext {
                    config,
                    mapper: ctx.mapper,
                    genes: ctx.genes,
                };
                let canvas = track::compose(
                    &name,
                    &rows,
                    &depth_columns,
                    gc_columns.as_deref(),
                    &track_ctx,
                );
                RenderedPartition {
                    name,
                    canvas,
                    rows,
                    depth_columns,
                    gc_columns,
                }
            })
            .collect();
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Interval;
    use crate::types::{CigarOp, CigarOpKind, ReadFlags, Strand};

    fn read(name: &str, start: u64) -> AlignedRead {
        AlignedRead::new(
            name,
            "chr1",
            start,
            vec![CigarOp::new(CigarOpKind::Match, 50)],
            Strand::Forward,
            ReadFlags::default(),
            None,
            0,
        )
    }

    fn context<'a>(config: &'a RenderConfig, mapper: &'a PixelMapper) -> RenderContext<'a> {
        RenderContext {
            config,
            mapper,
            genes: &[],
            gc: None,
        }
    }

    #[test]
    fn test_reads_without_key_are_dropped() {
        let mut manager = PartitionManager::new(false);
        manager.push(None, read("a", 100));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_no_partitions_is_an_error() {
        let manager = PartitionManager::new(false);
        let config = RenderConfig::default().validated();
        let mapper = PixelMapper::new(Interval::new("chr1", 1, 1000), config.width);
        let ctx = context(&config, &mapper);
        assert!(matches!(
            manager.materialize(&ctx),
            Err(RasterError::NoPartitions)
        ));
    }

    #[test]
    fn test_partitions_come_back_in_key_order() {
        let mut manager = PartitionManager::new(false);
        manager.push(Some("zeta"), read("a", 100));
        manager.push(Some("alpha"), read("b", 200));
        manager.push(Some("mid"), read("c", 300));
        let config = RenderConfig::default().validated();
        let mapper = PixelMapper::new(Interval::new("chr1", 1, 1000), config.width);
        let ctx = context(&config, &mapper);
        let rendered = manager.materialize(&ctx).unwrap();
        let names: Vec<&str> = rendered.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_each_partition_sees_only_its_reads() {
        let mut manager = PartitionManager::new(false);
        manager.push(Some("s1"), read("a", 100));
        manager.push(Some("s1"), read("b", 300));
        manager.push(Some("s2"), read("c", 100));
        let config = RenderConfig::default().validated();
        let mapper = PixelMapper::new(Interval::new("chr1", 1, 1000), config.width);
        let ctx = context(&config, &mapper);
        let rendered = manager.materialize(&ctx).unwrap();
        let total_pairs: usize = rendered[0].rows.iter().map(|r| r.len()).sum();
        assert_eq!(total_pairs, 2);
        let total_pairs: usize = rendered[1].rows.iter().map(|r| r.len()).sum();
        assert_eq!(total_pairs, 1);
    }

    #[test]
    fn test_materialize_is_deterministic() {
        let build = || {
            let mut manager = PartitionManager::new(false);
            for i in 0..20 {
                manager.push(Some("s"), read(&format!("r{}", i), 100 + i * 13));
            }
            manager
        };
        let config = RenderConfig::default().validated();
        let mapper = PixelMapper::new(Interval::new("chr1", 1, 1000), config.width);
        let ctx = context(&config, &mapper);
        let a = build().materialize(&ctx).unwrap();
        let b = build().materialize(&ctx).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.canvas.rasterize(), y.canvas.rasterize());
        }
    }
}
