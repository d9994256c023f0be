// tiling.rs — Packing series into render-target-sized batches.
//
// One heatmap-sized *tile* holds up to four series (one per RGBA channel).
// Tiles are repeated `repeats_x` times horizontally and `repeats_y` times
// vertically inside one physical render target:
//
//   ┌──────────┬──────────┬──────────┐   target width  = tile_w * repeats_x
//   │ (0,0)    │ (1,0)    │ (2,0)    │   target height = tile_h * repeats_y
//   │ s0..s3   │ s4..s7   │ s8..s11  │
//   ├──────────┼──────────┼──────────┤   slot s → row     = s / (4*repeats_x)
//   │ (0,1)    │ (1,1)    │ (2,1)    │            column  = (s % (4*repeats_x)) / 4
//   │ s12..s15 │ s16..s19 │ s20..s23 │            channel = s % 4
//   └──────────┴──────────┴──────────┘
//
// A batch therefore holds `4 * repeats_x * repeats_y` series. Repeats are
// bounded by the render-target size limit, by how many series there are to
// draw, and by the absolute caps below.

use std::ops::Range;

use crate::bins::HeatmapSize;
use crate::error::{HeatmapError, Result};

/// Color channels per texel; series packed per tile.
pub const CHANNELS: u32 = 4;

/// Upper bound on horizontally repeated tiles per render target.
pub const MAX_REPEATS_X: u32 = 32;

/// Upper bound on vertically repeated tiles per render target.
pub const MAX_REPEATS_Y: u32 = 32;

/// Render-target dimension cap applied when the backend reports nothing
/// smaller. Web-class backends misbehave above it.
pub const DEFAULT_MAX_RENDER_TARGET: u32 = 4096;

/// Where one series of a batch is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Tile column, `0..repeats_x`.
    pub column: u32,
    /// Tile row, `0..repeats_y`.
    pub row: u32,
    /// Color channel, `0..4` (R, G, B, A).
    pub channel: u32,
}

/// Texel rectangle `[x0, x0 + width) × [y0, y0 + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

/// Tile packing for one invocation. Constant for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub repeats_x: u32,
    pub repeats_y: u32,
}

impl TileLayout {
    /// Plan the tile repeats for `num_series` series.
    ///
    /// ```text
    /// max_repeats_x = floor(limit / tile_width)
    /// max_repeats_y = floor(limit / tile_height)
    /// repeats_x     = min(max_repeats_x, ceil(n / 4), MAX_REPEATS_X)
    /// repeats_y     = min(max_repeats_y, ceil(n / (4 * repeats_x)), MAX_REPEATS_Y)
    /// ```
    ///
    /// Both repeats are at least 1, so zero series still yield a valid
    /// (empty) layout.
    ///
    /// # Errors
    /// `InvalidConfig` if the heatmap has a zero dimension, `limit` is zero,
    /// or a single tile does not fit in `limit`.
    pub fn plan(num_series: usize, size: HeatmapSize, limit: u32) -> Result<Self> {
        if size.width == 0 || size.height == 0 {
            return Err(HeatmapError::InvalidConfig(format!(
                "heatmap size {}x{} has a zero dimension",
                size.width, size.height
            )));
        }
        if limit == 0 {
            return Err(HeatmapError::InvalidConfig(
                "max render target size must be positive".into(),
            ));
        }
        if size.width > limit || size.height > limit {
            return Err(HeatmapError::InvalidConfig(format!(
                "heatmap {}x{} does not fit in a {limit}x{limit} render target",
                size.width, size.height
            )));
        }

        let max_repeats_x = limit / size.width;
        let max_repeats_y = limit / size.height;

        let n = num_series as u64;
        let wanted_x = n.div_ceil(CHANNELS as u64);
        let repeats_x = clamp_repeats(max_repeats_x, wanted_x, MAX_REPEATS_X);

        let wanted_y = n.div_ceil(CHANNELS as u64 * repeats_x as u64);
        let repeats_y = clamp_repeats(max_repeats_y, wanted_y, MAX_REPEATS_Y);

        tracing::info!(
            max_repeats_x,
            max_repeats_y,
            repeats_x,
            repeats_y,
            "planned tile repeats"
        );

        Ok(TileLayout {
            tile_width: size.width,
            tile_height: size.height,
            repeats_x,
            repeats_y,
        })
    }

    /// Physical render-target width: `tile_width * repeats_x`.
    #[inline]
    pub fn target_width(&self) -> u32 {
        self.tile_width * self.repeats_x
    }

    /// Physical render-target height: `tile_height * repeats_y`.
    #[inline]
    pub fn target_height(&self) -> u32 {
        self.tile_height * self.repeats_y
    }

    /// Number of tiles in one render target.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.repeats_x * self.repeats_y
    }

    /// Series per batch: 4 channels × tile count.
    #[inline]
    pub fn batch_capacity(&self) -> usize {
        (CHANNELS * self.tile_count()) as usize
    }

    /// Assign batch slot `index` to its tile and channel (raster order:
    /// tile rows, then 4-channel groups per tile column).
    ///
    /// # Panics
    /// Panics if `index >= batch_capacity()`.
    pub fn slot(&self, index: usize) -> Slot {
        assert!(
            index < self.batch_capacity(),
            "slot {index} exceeds batch capacity {}",
            self.batch_capacity()
        );
        let per_row = (CHANNELS * self.repeats_x) as usize;
        let row = index / per_row;
        let within = index % per_row;
        Slot {
            column: (within / CHANNELS as usize) as u32,
            row: row as u32,
            channel: (within % CHANNELS as usize) as u32,
        }
    }

    /// Texel rectangle of tile `(column, row)`.
    pub fn tile_rect(&self, column: u32, row: u32) -> TileRect {
        TileRect {
            x0: column * self.tile_width,
            y0: row * self.tile_height,
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// Consecutive series ranges, each at most `batch_capacity()` long.
    pub fn batches(&self, num_series: usize) -> impl Iterator<Item = Range<usize>> {
        let cap = self.batch_capacity();
        (0..num_series)
            .step_by(cap)
            .map(move |start| start..(start + cap).min(num_series))
    }

    /// Number of batches needed for `num_series` series.
    pub fn batch_count(&self, num_series: usize) -> usize {
        num_series.div_ceil(self.batch_capacity())
    }
}

/// `min(max_fit, wanted, cap)`, but never below 1.
fn clamp_repeats(max_fit: u32, wanted: u64, cap: u32) -> u32 {
    let wanted = wanted.min(u32::MAX as u64) as u32;
    max_fit.min(wanted).min(cap).max(1)
}
