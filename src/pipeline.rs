// pipeline.rs — Driver loop.
//
//   validate ─ plan ─ configure ─┬─ batch 0: rasterize → [smooth] → reduce → normalize
//                                ├─ batch 1: ...
//                                └─ batch N
//                 merge_tiles ─ read_heatmap ─ extract_cells ─ release
//
// All caller input is validated before the backend is touched. If any pass
// fails, the backend's targets are released and no partial result is
// returned.

use std::time::Instant;

use tracing::{debug, debug_span, info};

use crate::backend::{Batch, CpuBackend, PassConfig, RenderBackend};
use crate::bins::{BinConfig, HeatmapSize};
use crate::error::Result;
use crate::gpu::GpuBackend;
use crate::options::HeatmapOptions;
use crate::raster::AxisMapping;
use crate::result::{self, HeatmapCell};
use crate::series::SeriesMatrix;
use crate::surface::{Rgba, Surface};
use crate::tiling::TileLayout;

/// Owns a render backend and computes heatmaps with it.
///
/// Construct once and reuse: a GPU backend keeps its device between calls,
/// while render targets live only for the duration of one `compute`.
pub struct Pipeline<B: RenderBackend> {
    backend: B,
}

impl Pipeline<CpuBackend> {
    /// Pipeline on the software reference backend.
    pub fn cpu() -> Self {
        Pipeline::new(CpuBackend::new())
    }
}

impl Pipeline<GpuBackend> {
    /// Pipeline on the first suitable GPU adapter.
    pub fn gpu() -> Result<Self> {
        Ok(Pipeline::new(GpuBackend::new()?))
    }
}

impl<B: RenderBackend> Pipeline<B> {
    pub fn new(backend: B) -> Self {
        Pipeline { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Compute the density heatmap of `series` over the `bin_x × bin_y` grid.
    ///
    /// Returns `width * height` cells, time bin outer, value bin inner.
    ///
    /// Sample `j` of every series sits at time coordinate `j`, so a series
    /// of `n` samples spans `[0, n - 1]`. Bins past the last sample stay
    /// empty: to cover every time column use
    /// `BinConfig::new(0.0, (n - 1) as f32, step)`, not `stop = n`.
    pub fn compute(
        &mut self,
        series: &SeriesMatrix,
        bin_x: &BinConfig,
        bin_y: &BinConfig,
        options: &HeatmapOptions,
    ) -> Result<Vec<HeatmapCell>> {
        self.run(series, bin_x, bin_y, options, None)
    }

    /// Like [`compute`](Self::compute), and also copy the accumulation
    /// target after the last batch into `debug`. `debug` is resized to the
    /// render-target size. The returned cells are unaffected.
    pub fn compute_with_debug(
        &mut self,
        series: &SeriesMatrix,
        bin_x: &BinConfig,
        bin_y: &BinConfig,
        options: &HeatmapOptions,
        debug: &mut Surface<Rgba>,
    ) -> Result<Vec<HeatmapCell>> {
        self.run(series, bin_x, bin_y, options, Some(debug))
    }

    fn run(
        &mut self,
        series: &SeriesMatrix,
        bin_x: &BinConfig,
        bin_y: &BinConfig,
        options: &HeatmapOptions,
        debug: Option<&mut Surface<Rgba>>,
    ) -> Result<Vec<HeatmapCell>> {
        let start = Instant::now();

        let size = HeatmapSize::from_bins(bin_x, bin_y)?;
        options.validate()?;
        let kernel = options.kernel()?;
        let stroke = options.stroke()?;

        let limit = options
            .max_render_target_size
            .map_or(self.backend.max_render_target_size(), |cap| {
                cap.min(self.backend.max_render_target_size())
            });
        let layout = TileLayout::plan(series.num_series(), size, limit)?;

        info!(
            backend = self.backend.label(),
            width = size.width,
            height = size.height,
            series = series.num_series(),
            points = series.num_points(),
            kernel = kernel.as_ref().map_or(0, |k| k.size()),
            target_width = layout.target_width(),
            target_height = layout.target_height(),
            "computing heatmap"
        );

        let config = PassConfig {
            layout,
            mapping: AxisMapping::new(bin_x, bin_y),
            stroke,
            kernel,
            num_points: series.num_points(),
        };

        let outcome = self.execute(series, &config, debug);
        self.backend.release();
        let heatmap = outcome?;

        let cells = result::extract_cells(&heatmap, bin_x, bin_y, options.column_scale);
        info!(
            cells = cells.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "heatmap ready"
        );
        Ok(cells)
    }

    fn execute(
        &mut self,
        series: &SeriesMatrix,
        config: &PassConfig,
        debug: Option<&mut Surface<Rgba>>,
    ) -> Result<Surface<f32>> {
        let t = Instant::now();
        self.backend.configure(config)?;
        debug!(elapsed_ms = t.elapsed().as_secs_f64() * 1e3, "configured targets");

        let smoothing = config.kernel.is_some();
        let batches = config.layout.batch_count(series.num_series());
        for (index, range) in config.layout.batches(series.num_series()).enumerate() {
            let _span = debug_span!("batch", index, of = batches, series = range.len()).entered();
            let t = Instant::now();
            let batch = Batch::new(series.rows(range), config.num_points);

            self.backend.rasterize(&batch)?;
            if smoothing {
                self.backend.smooth()?;
            }
            self.backend.reduce_columns()?;
            self.backend.normalize()?;
            debug!(elapsed_ms = t.elapsed().as_secs_f64() * 1e3, "batch accumulated");
        }

        if let Some(surface) = debug {
            *surface = self.backend.read_accumulation()?;
        }

        let t = Instant::now();
        self.backend.merge_tiles()?;
        let heatmap = self.backend.read_heatmap()?;
        debug!(elapsed_ms = t.elapsed().as_secs_f64() * 1e3, "merged and read back");
        Ok(heatmap)
    }
}

/// One-shot heatmap on a fresh GPU backend.
pub fn compute_heatmap(
    series: &SeriesMatrix,
    bin_x: &BinConfig,
    bin_y: &BinConfig,
    options: &HeatmapOptions,
) -> Result<Vec<HeatmapCell>> {
    Pipeline::gpu()?.compute(series, bin_x, bin_y, options)
}
