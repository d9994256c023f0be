// series-density: GPU-accelerated density heatmaps of many time series
//
// Every series is drawn as an anti-aliasing-free line strip over a
// (time bin × value bin) grid, optionally smoothed, normalized so that each
// series contributes one unit of mass per time column, and summed.
//
//   bins ─ tiling ─┬─ raster → smooth → reduce ─┬─ result
//                  └──────── backend ───────────┘
//
// `CpuBackend` is the reference implementation; `gpu::GpuBackend` runs the
// same passes on a wgpu device.

pub mod backend;
pub mod bins;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod options;
pub mod pipeline;
pub mod raster;
pub mod reduce;
pub mod result;
pub mod series;
pub mod smooth;
pub mod surface;
pub mod tiling;

pub use backend::{CpuBackend, RenderBackend};
pub use bins::{BinConfig, HeatmapSize};
pub use error::{BackendError, HeatmapError, Result};
pub use kernel::GaussianKernel;
pub use options::HeatmapOptions;
pub use pipeline::{compute_heatmap, Pipeline};
pub use result::{ColumnScale, HeatmapCell};
pub use series::SeriesMatrix;
pub use surface::{Rgba, Surface};
