// error.rs — Error taxonomy for heatmap computation.
//
// Two families:
//   - configuration errors, raised before any render target is allocated
//     (bad bins, bad kernel, bad stroke parameters, ragged series);
//   - backend errors, raised by the rendering device (adapter/device
//     acquisition, validation, allocation, readback).
//
// Both are fatal to the invocation and neither is retried. A failed
// invocation returns no partial heatmap.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HeatmapError>;

/// Errors surfaced by [`crate::pipeline::Pipeline`] and its components.
#[derive(Error, Debug)]
pub enum HeatmapError {
    /// Degenerate bin ranges, invalid stroke extents, malformed series, or a
    /// tile that cannot fit in the render-target limit.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Smoothing kernel is empty, not square, even-sized, or non-finite.
    #[error("invalid gaussian kernel: {0}")]
    InvalidKernel(String),

    /// The rendering backend failed while the computation was in flight.
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),
}

impl HeatmapError {
    /// `true` for errors detected before any backend work was issued.
    pub fn is_config_error(&self) -> bool {
        matches!(self, HeatmapError::InvalidConfig(_) | HeatmapError::InvalidKernel(_))
    }
}

/// Failures reported by a [`crate::backend::RenderBackend`].
#[derive(Error, Debug)]
pub enum BackendError {
    /// No adapter could be enumerated for the requested wgpu backends.
    #[error("no suitable GPU adapter found")]
    NoSuitableAdapter,

    /// wgpu device request failed (driver issue, unsupported limits, ...).
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// A program or resource was rejected by the device's validation layer.
    #[error("validation error during {context}: {message}")]
    Validation { context: String, message: String },

    /// The device ran out of memory while allocating render targets.
    #[error("out of memory during {0}")]
    OutOfMemory(String),

    /// Mapping a readback buffer failed or its callback never fired.
    #[error("readback failed: {0}")]
    Readback(String),

    /// A pass was issued before `configure` or after `release`.
    #[error("backend used before configure()")]
    NotConfigured,
}
