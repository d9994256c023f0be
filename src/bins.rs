// bins.rs — Axis binning configuration.
//
// Two `BinConfig`s describe the heatmap grid: X bins the implicit time axis
// (sample index), Y bins the value axis. A bin is the half-open interval
// [start + i*step, start + (i+1)*step).

use serde::{Deserialize, Serialize};

use crate::error::{HeatmapError, Result};

/// Range and step of one heatmap axis, in original data units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    /// The start of the range.
    pub start: f32,
    /// The end of the range.
    pub stop: f32,
    /// The size of bin steps.
    pub step: f32,
}

impl BinConfig {
    pub fn new(start: f32, stop: f32, step: f32) -> Self {
        BinConfig { start, stop, step }
    }

    /// Number of whole bins in `[start, stop)`: `floor((stop - start) / step)`.
    ///
    /// The quotient is taken in f64: an f32 quotient can round up across an
    /// integer for decimal steps (0.7 / 0.1 rounds to exactly 7.0).
    ///
    /// Returns 0 for configurations that `validate` rejects.
    pub fn count(&self) -> u32 {
        if !self.is_well_formed() {
            return 0;
        }
        let n = ((self.stop as f64 - self.start as f64) / self.step as f64).floor();
        if n >= u32::MAX as f64 {
            u32::MAX
        } else {
            n as u32
        }
    }

    /// Start coordinate of bin `index`, in original units.
    #[inline]
    pub fn bin_start(&self, index: u32) -> f32 {
        self.start + index as f32 * self.step
    }

    /// Map a coordinate in original units to continuous bin units
    /// (0.0 = left edge of bin 0, 1.0 = left edge of bin 1, ...).
    #[inline]
    pub fn to_bin_units(&self, v: f32) -> f32 {
        (v - self.start) / self.step
    }

    /// Reject non-finite fields, `step <= 0`, `stop <= start`, and ranges
    /// shorter than one step. `axis` names the axis in the error message.
    pub fn validate(&self, axis: &str) -> Result<()> {
        if !self.is_well_formed() {
            return Err(HeatmapError::InvalidConfig(format!(
                "{axis} bins must satisfy step > 0 and stop > start (got start={}, stop={}, step={})",
                self.start, self.stop, self.step
            )));
        }
        if self.count() == 0 {
            return Err(HeatmapError::InvalidConfig(format!(
                "{axis} bins yield zero cells (range {} is shorter than step {})",
                self.stop - self.start,
                self.step
            )));
        }
        Ok(())
    }

    fn is_well_formed(&self) -> bool {
        self.start.is_finite()
            && self.stop.is_finite()
            && self.step.is_finite()
            && self.step > 0.0
            && self.stop > self.start
    }
}

/// Cell counts of the heatmap grid derived from the two axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapSize {
    /// Number of time bins (columns).
    pub width: u32,
    /// Number of value bins (rows).
    pub height: u32,
}

impl HeatmapSize {
    /// Validate both axes and compute the grid size.
    pub fn from_bins(bin_x: &BinConfig, bin_y: &BinConfig) -> Result<Self> {
        bin_x.validate("x")?;
        bin_y.validate("y")?;
        Ok(HeatmapSize {
            width: bin_x.count(),
            height: bin_y.count(),
        })
    }

    /// Total number of cells (`width * height`).
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
