// options.rs — Per-invocation heatmap options.
//
// Everything except the series and the two bin configurations. Options are
// plain data (serde, JSON-loadable); `validate` turns them into the typed
// pieces the pipeline consumes before any render target exists.

use serde::{Deserialize, Serialize};

use crate::error::{HeatmapError, Result};
use crate::kernel::GaussianKernel;
use crate::raster::StrokeStyle;
use crate::result::ColumnScale;

/// Options recognized by [`crate::pipeline::Pipeline::compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapOptions {
    /// Square, odd-sized smoothing kernel. `None` disables smoothing.
    pub gaussian_kernel: Option<Vec<Vec<f32>>>,
    /// Stroke width in texels.
    pub line_width: f32,
    /// End-cap extension along the line direction, in texels.
    pub tangent_extent: f32,
    /// Extra half-width added on both sides of the stroke, in texels.
    pub normal_extent: f32,
    /// Cap on the render-target side length. Smaller caps mean fewer tiles
    /// per batch and more batches.
    pub max_render_target_size: Option<u32>,
    /// How accumulated column mass is reported.
    pub column_scale: ColumnScale,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        HeatmapOptions {
            gaussian_kernel: None,
            line_width: 1.0,
            tangent_extent: 0.0,
            normal_extent: 0.0,
            max_render_target_size: None,
            column_scale: ColumnScale::Unit,
        }
    }
}

impl HeatmapOptions {
    /// Parse options from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| HeatmapError::InvalidConfig(format!("options JSON: {e}")))
    }

    /// Smoothing with an explicit kernel.
    pub fn with_kernel(mut self, kernel: &GaussianKernel) -> Self {
        let n = kernel.size();
        self.gaussian_kernel = Some(kernel.weights().chunks(n).map(<[f32]>::to_vec).collect());
        self
    }

    pub fn with_max_render_target_size(mut self, size: u32) -> Self {
        self.max_render_target_size = Some(size);
        self
    }

    /// Validated smoothing kernel, if any.
    pub fn kernel(&self) -> Result<Option<GaussianKernel>> {
        self.gaussian_kernel
            .as_deref()
            .map(GaussianKernel::from_rows)
            .transpose()
    }

    /// Validated stroke geometry.
    pub fn stroke(&self) -> Result<StrokeStyle> {
        StrokeStyle::new(self.line_width, self.tangent_extent, self.normal_extent)
    }

    /// Check every option without touching a backend.
    pub fn validate(&self) -> Result<()> {
        self.kernel()?;
        self.stroke()?;
        if self.max_render_target_size == Some(0) {
            return Err(HeatmapError::InvalidConfig(
                "max_render_target_size must be positive".into(),
            ));
        }
        Ok(())
    }
}
