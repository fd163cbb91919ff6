//! Optional TOML settings file
//!
//! Command-line flags always win over the file; the file wins over the
//! built-in defaults. Every key is optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use bamraster_core::RenderConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub width: Option<u32>,
    pub min_gap: Option<u64>,
    pub max_rows: Option<i32>,
    pub feature_height: Option<u32>,
    pub spacing: Option<u32>,
    pub min_arrow_width: Option<u32>,
    pub depth_track_height: Option<u32>,
    pub gc_track_height: Option<u32>,
    pub gc_window: Option<u64>,
    pub show_clip: Option<bool>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing settings {}", path.display()))
    }

    /// Overlay these settings on the built-in defaults.
    pub fn apply(&self, mut config: RenderConfig) -> RenderConfig {
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.min_gap {
            config.min_gap = v;
        }
        if let Some(v) = self.max_rows {
            config.max_rows = v;
        }
        if let Some(v) = self.feature_height {
            config.feature_height = v;
        }
        if let Some(v) = self.spacing {
            config.spacing = v;
        }
        if let Some(v) = self.min_arrow_width {
            config.min_arrow_width = v;
        }
        if let Some(v) = self.depth_track_height {
            config.depth_track_height = v;
        }
        if let Some(v) = self.gc_track_height {
            config.gc_track_height = v;
        }
        if let Some(v) = self.gc_window {
            config.gc_window = v;
        }
        if let Some(v) = self.show_clip {
            config.show_clip = v;
        }
        config
    }
}
