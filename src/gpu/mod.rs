// gpu/mod.rs — wgpu backend.
//
// Mirrors the CPU passes in the parent crate on a GPU device. The CPU
// backend stays the authoritative reference; every GPU pass is validated
// against it texel-for-texel.
//
//   device   adapter selection, limits, error scopes
//   target   float render targets and readback
//   lines    triangle-strip rasterization (render pipelines)
//   passes   compute passes: smooth, column sums, normalize, merges
//   backend  `RenderBackend` over the pieces above
//
// Per batch, only the line samples cross the bus. Targets stay on the
// device until the merged heatmap is read back once.

pub mod backend;
pub mod device;
pub mod lines;
pub mod passes;
pub mod target;

pub use backend::GpuBackend;
pub use device::{DeviceProfile, GpuDevice};
