// backend.rs — Render backend abstraction and the CPU reference backend.
//
// A backend owns the per-invocation render targets and executes the passes
// in the order the driver issues them:
//
//   configure ─┬─ per batch: rasterize → [smooth] → reduce_columns → normalize
//              └─ once:      merge_tiles → read_heatmap → release
//
// The accumulation target is zeroed by `configure` and only ever added to
// by `normalize`; every other target is rewritten by the pass that owns it.
//
// `CpuBackend` is the authoritative implementation. The GPU backend
// (`gpu::GpuBackend`) is validated against it texel-for-texel.

use crate::error::{BackendError, Result};
use crate::kernel::GaussianKernel;
use crate::raster::{self, AxisMapping, StrokeStyle};
use crate::reduce;
use crate::smooth;
use crate::surface::{Rgba, Surface};
use crate::tiling::{TileLayout, DEFAULT_MAX_RENDER_TARGET};

/// Everything a backend needs to allocate targets and compile programs.
/// Constant for one invocation.
#[derive(Debug, Clone)]
pub struct PassConfig {
    pub layout: TileLayout,
    pub mapping: AxisMapping,
    pub stroke: StrokeStyle,
    pub kernel: Option<GaussianKernel>,
    /// Samples per series.
    pub num_points: usize,
}

/// One batch of series, back to back, `num_points` samples each.
/// Series `i` of the batch is drawn into slot `i`.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub values: &'a [f32],
    pub count: usize,
}

impl<'a> Batch<'a> {
    pub fn new(values: &'a [f32], num_points: usize) -> Self {
        let count = if num_points == 0 { 0 } else { values.len() / num_points };
        Batch { values, count }
    }
}

/// The passes of the density pipeline, executed against one device.
pub trait RenderBackend {
    /// Short name for logs.
    fn label(&self) -> &str;

    /// Largest render-target side length the device supports.
    fn max_render_target_size(&self) -> u32;

    /// Allocate render targets and compile programs for one invocation.
    /// Zeroes the accumulation target.
    fn configure(&mut self, config: &PassConfig) -> Result<()>;

    /// Clear the line target and draw every series of the batch.
    fn rasterize(&mut self, batch: &Batch<'_>) -> Result<()>;

    /// Smooth the line target with the configured kernel. No-op without one.
    fn smooth(&mut self) -> Result<()>;

    /// Per-column, per-tile-row sums of the (smoothed) line target.
    fn reduce_columns(&mut self) -> Result<()>;

    /// `accumulation += lines / sums`.
    fn normalize(&mut self) -> Result<()>;

    /// Collapse tiles and channels into the heatmap target.
    fn merge_tiles(&mut self) -> Result<()>;

    /// Blocking readback of the merged heatmap.
    fn read_heatmap(&mut self) -> Result<Surface<f32>>;

    /// Blocking readback of the accumulation target.
    fn read_accumulation(&mut self) -> Result<Surface<Rgba>>;

    /// Drop every per-invocation target. Safe to call more than once.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// CpuBackend
// ---------------------------------------------------------------------------

struct CpuTargets {
    config: PassConfig,
    lines: Surface<Rgba>,
    sums: Surface<Rgba>,
    accum: Surface<Rgba>,
    heatmap: Option<Surface<f32>>,
}

/// Software backend on host surfaces.
pub struct CpuBackend {
    max_render_target_size: u32,
    targets: Option<CpuTargets>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_max_render_target_size(DEFAULT_MAX_RENDER_TARGET)
    }

    /// Report a different render-target limit (useful to force batching).
    pub fn with_max_render_target_size(size: u32) -> Self {
        CpuBackend { max_render_target_size: size, targets: None }
    }

    fn targets(&mut self) -> Result<&mut CpuTargets> {
        self.targets.as_mut().ok_or_else(|| BackendError::NotConfigured.into())
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for CpuBackend {
    fn label(&self) -> &str {
        "cpu"
    }

    fn max_render_target_size(&self) -> u32 {
        self.max_render_target_size
    }

    fn configure(&mut self, config: &PassConfig) -> Result<()> {
        let l = &config.layout;
        let (w, h) = (l.target_width() as usize, l.target_height() as usize);
        self.targets = Some(CpuTargets {
            config: config.clone(),
            lines: Surface::new(w, h),
            sums: Surface::new(w, l.repeats_y as usize),
            accum: Surface::new(w, h),
            heatmap: None,
        });
        Ok(())
    }

    fn rasterize(&mut self, batch: &Batch<'_>) -> Result<()> {
        let t = self.targets()?;
        let cfg = &t.config;
        raster::rasterize_batch(
            &mut t.lines,
            &cfg.layout,
            &batch.values[..batch.count * cfg.num_points],
            cfg.num_points,
            &cfg.mapping,
            &cfg.stroke,
        );
        Ok(())
    }

    fn smooth(&mut self) -> Result<()> {
        let t = self.targets()?;
        if let Some(kernel) = &t.config.kernel {
            t.lines = smooth::smooth_tiles(&t.lines, kernel, &t.config.layout);
        }
        Ok(())
    }

    fn reduce_columns(&mut self) -> Result<()> {
        let t = self.targets()?;
        t.sums = reduce::column_sums(&t.lines, &t.config.layout);
        Ok(())
    }

    fn normalize(&mut self) -> Result<()> {
        let t = self.targets()?;
        reduce::normalize_accumulate(&mut t.accum, &t.lines, &t.sums, &t.config.layout);
        Ok(())
    }

    fn merge_tiles(&mut self) -> Result<()> {
        let t = self.targets()?;
        let horizontal = reduce::merge_horizontal(&t.accum, &t.config.layout);
        t.heatmap = Some(reduce::merge_vertical(&horizontal, &t.config.layout));
        Ok(())
    }

    fn read_heatmap(&mut self) -> Result<Surface<f32>> {
        let t = self.targets()?;
        t.heatmap.clone().ok_or_else(|| {
            BackendError::Readback("heatmap read before merge_tiles".into()).into()
        })
    }

    fn read_accumulation(&mut self) -> Result<Surface<Rgba>> {
        Ok(self.targets()?.accum.clone())
    }

    fn release(&mut self) {
        self.targets = None;
    }
}
