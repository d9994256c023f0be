// result.rs — Heatmap readback to `{x, y, value}` cells.
//
// The merged heatmap surface is `width × height`, column = time bin,
// row = value bin. Cells are emitted time-bin outer, value-bin inner:
//
//   cell(col, row) = { x: bin_x.start + col * bin_x.step,
//                      y: bin_y.start + row * bin_y.step,
//                      value }
//
// After accumulation a column holds the number of series that crossed it.
// `ColumnScale::Unit` rescales every non-empty column to sum to 1.

use serde::{Deserialize, Serialize};

use crate::bins::BinConfig;
use crate::surface::Surface;

/// One heatmap cell, positioned at its bins' start coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub x: f32,
    pub y: f32,
    pub value: f32,
}

/// How accumulated column mass is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnScale {
    /// Every non-empty time column sums to 1.
    #[default]
    Unit,
    /// Raw accumulated mass: a column sums to the number of series crossing it.
    SeriesCount,
}

/// Turn the merged heatmap into `width * height` cells.
pub fn extract_cells(
    heatmap: &Surface<f32>,
    bin_x: &BinConfig,
    bin_y: &BinConfig,
    scale: ColumnScale,
) -> Vec<HeatmapCell> {
    let (w, h) = (heatmap.width(), heatmap.height());
    let mut cells = Vec::with_capacity(w * h);
    for col in 0..w {
        let divisor = match scale {
            ColumnScale::SeriesCount => 1.0,
            ColumnScale::Unit => {
                let total: f32 = (0..h).map(|row| heatmap.get(col, row)).sum();
                if total > 0.0 {
                    total
                } else {
                    1.0
                }
            }
        };
        let x = bin_x.bin_start(col as u32);
        for row in 0..h {
            cells.push(HeatmapCell {
                x,
                y: bin_y.bin_start(row as u32),
                value: heatmap.get(col, row) / divisor,
            });
        }
    }
    cells
}

/// Cells carrying density, in the original order.
pub fn nonzero(cells: &[HeatmapCell]) -> impl Iterator<Item = &HeatmapCell> + '_ {
    cells.iter().filter(|c| c.value > 0.0)
}
