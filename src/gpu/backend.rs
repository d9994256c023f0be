// gpu/backend.rs — `RenderBackend` on a wgpu device.
//
// Targets allocated by `configure` (W×H = tile size, TW×TH = render target):
//
//   lines       TW × TH          Rgba32Float  render attachment
//   smoothed    TW × TH          Rgba32Float  only with a kernel
//   sums        TW × repeats_y   Rgba32Float
//   accum[2]    TW × TH          Rgba32Float  ping-pong
//   horizontal  W  × TH          Rgba32Float
//   heatmap     W  × H           R32Float
//
// ACCUMULATION
// ────────────
// Float32 blending is not a core feature, so `normalize` cannot add into the
// accumulation target with a blend state. It reads accum[current] and writes
// accum[1 - current] instead, then flips `current`:
//
//   batch 0: accum[0] (zeros) ─normalize─▶ accum[1]
//   batch 1: accum[1]          ─normalize─▶ accum[0]
//   ...
//
// One bind group per direction is built up front, so a batch costs no
// allocation beyond the line samples upload.

use tracing::debug;

use crate::backend::{Batch, PassConfig, RenderBackend};
use crate::error::{BackendError, Result};
use crate::gpu::device::{DeviceProfile, GpuDevice};
use crate::gpu::lines::LineProgram;
use crate::gpu::passes::{templates, BindingKind, ComputePass, ShaderConstants};
use crate::gpu::target::{RenderTarget, PASS_USAGE};
use crate::surface::{Rgba, Surface};
use crate::tiling::DEFAULT_MAX_RENDER_TARGET;

const RGBA: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Per-invocation targets and compiled programs.
struct GpuTargets {
    config: PassConfig,
    lines: RenderTarget,
    _smoothed: Option<RenderTarget>,
    accum: [RenderTarget; 2],
    current: usize,
    heatmap: RenderTarget,
    merged: bool,

    line_program: Option<LineProgram>,
    smooth: Option<ComputePass>,
    column_sums: ComputePass,
    normalize: ComputePass,
    merge_horizontal: ComputePass,
    merge_vertical: ComputePass,

    // Only referenced through the bind groups above.
    _sums: RenderTarget,
    _horizontal: RenderTarget,
    _weights: Option<wgpu::Buffer>,
}

/// GPU implementation of the density pipeline.
pub struct GpuBackend {
    gpu: GpuDevice,
    targets: Option<GpuTargets>,
}

impl GpuBackend {
    /// Open the first suitable adapter with the native profile.
    pub fn new() -> Result<Self> {
        Ok(Self::with_device(GpuDevice::new()?))
    }

    pub fn new_with(profile: DeviceProfile, backends: wgpu::Backends) -> Result<Self> {
        Ok(Self::with_device(GpuDevice::new_with(profile, backends)?))
    }

    pub fn with_device(gpu: GpuDevice) -> Self {
        GpuBackend { gpu, targets: None }
    }

    pub fn device(&self) -> &GpuDevice {
        &self.gpu
    }

    fn submit(gpu: &GpuDevice, context: &str, record: impl FnOnce(&mut wgpu::CommandEncoder)) -> Result<()> {
        gpu.scoped(context, || {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(context) });
            record(&mut encoder);
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;
        Ok(())
    }
}

impl RenderBackend for GpuBackend {
    fn label(&self) -> &str {
        "gpu"
    }

    /// Device limit, capped at `DEFAULT_MAX_RENDER_TARGET`.
    fn max_render_target_size(&self) -> u32 {
        self.gpu.max_texture_dimension().min(DEFAULT_MAX_RENDER_TARGET)
    }

    fn configure(&mut self, config: &PassConfig) -> Result<()> {
        self.targets = None;
        let gpu = &self.gpu;
        let l = &config.layout;
        let (tw, th) = (l.target_width(), l.target_height());
        let constants = ShaderConstants::for_config(config);

        let (lines, smoothed, sums, accum, horizontal, heatmap, weights) =
            gpu.scoped("render targets", || {
                let lines = RenderTarget::new(
                    gpu,
                    "lines",
                    tw,
                    th,
                    RGBA,
                    PASS_USAGE | wgpu::TextureUsages::RENDER_ATTACHMENT,
                );
                let smoothed = config.kernel.as_ref().map(|_| RenderTarget::rgba(gpu, "smoothed", tw, th));
                let sums = RenderTarget::rgba(gpu, "column sums", tw, l.repeats_y);
                let accum = [
                    RenderTarget::rgba(gpu, "accumulation 0", tw, th),
                    RenderTarget::rgba(gpu, "accumulation 1", tw, th),
                ];
                let horizontal = RenderTarget::rgba(gpu, "horizontal merge", l.tile_width, th);
                let heatmap = RenderTarget::scalar(gpu, "heatmap", l.tile_width, l.tile_height);
                let weights = config.kernel.as_ref().map(|k| {
                    use wgpu::util::DeviceExt;
                    gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("kernel weights"),
                        contents: bytemuck::cast_slice(k.weights()),
                        usage: wgpu::BufferUsages::STORAGE,
                    })
                });
                (lines, smoothed, sums, accum, horizontal, heatmap, weights)
            })?;

        let line_program = if config.num_points >= 2 {
            Some(LineProgram::new(gpu, config, &constants)?)
        } else {
            None
        };

        // Later passes read the smoothed target when there is one.
        let input = smoothed.as_ref().unwrap_or(&lines);

        let smooth = match (&smoothed, &weights) {
            (Some(dst), Some(buf)) => {
                let mut pass = ComputePass::new(
                    gpu,
                    "smooth_tiles",
                    templates::SMOOTH,
                    &constants,
                    &[BindingKind::Texture, BindingKind::StorageTexture(RGBA), BindingKind::ReadOnlyBuffer],
                    (tw, th),
                )?;
                pass.add_bind_group(
                    gpu,
                    &[
                        wgpu::BindingResource::TextureView(&lines.view),
                        wgpu::BindingResource::TextureView(&dst.view),
                        buf.as_entire_binding(),
                    ],
                );
                Some(pass)
            }
            _ => None,
        };

        let mut column_sums = ComputePass::new(
            gpu,
            "column_sums",
            templates::COLUMN_SUMS,
            &constants,
            &[BindingKind::Texture, BindingKind::StorageTexture(RGBA)],
            (tw, l.repeats_y),
        )?;
        column_sums.add_bind_group(
            gpu,
            &[
                wgpu::BindingResource::TextureView(&input.view),
                wgpu::BindingResource::TextureView(&sums.view),
            ],
        );

        let mut normalize = ComputePass::new(
            gpu,
            "normalize_accumulate",
            templates::NORMALIZE,
            &constants,
            &[
                BindingKind::Texture,
                BindingKind::Texture,
                BindingKind::Texture,
                BindingKind::StorageTexture(RGBA),
            ],
            (tw, th),
        )?;
        let mut merge_horizontal = ComputePass::new(
            gpu,
            "merge_horizontal",
            templates::MERGE_HORIZONTAL,
            &constants,
            &[BindingKind::Texture, BindingKind::StorageTexture(RGBA)],
            (l.tile_width, th),
        )?;
        // Group i reads accum[i]; normalize writes accum[1 - i].
        for i in 0..2 {
            normalize.add_bind_group(
                gpu,
                &[
                    wgpu::BindingResource::TextureView(&input.view),
                    wgpu::BindingResource::TextureView(&sums.view),
                    wgpu::BindingResource::TextureView(&accum[i].view),
                    wgpu::BindingResource::TextureView(&accum[1 - i].view),
                ],
            );
            merge_horizontal.add_bind_group(
                gpu,
                &[
                    wgpu::BindingResource::TextureView(&accum[i].view),
                    wgpu::BindingResource::TextureView(&horizontal.view),
                ],
            );
        }

        let mut merge_vertical = ComputePass::new(
            gpu,
            "merge_vertical",
            templates::MERGE_VERTICAL,
            &constants,
            &[BindingKind::Texture, BindingKind::StorageTexture(wgpu::TextureFormat::R32Float)],
            (l.tile_width, l.tile_height),
        )?;
        merge_vertical.add_bind_group(
            gpu,
            &[
                wgpu::BindingResource::TextureView(&horizontal.view),
                wgpu::BindingResource::TextureView(&heatmap.view),
            ],
        );

        debug!(
            target_width = tw,
            target_height = th,
            smoothing = smooth.is_some(),
            "GPU targets allocated"
        );

        self.targets = Some(GpuTargets {
            config: config.clone(),
            lines,
            _smoothed: smoothed,
            accum,
            current: 0,
            heatmap,
            merged: false,
            line_program,
            smooth,
            column_sums,
            normalize,
            merge_horizontal,
            merge_vertical,
            _sums: sums,
            _horizontal: horizontal,
            _weights: weights,
        });
        Ok(())
    }

    fn rasterize(&mut self, batch: &Batch<'_>) -> Result<()> {
        let t = self.targets.as_ref().ok_or(BackendError::NotConfigured)?;
        let gpu = &self.gpu;
        gpu.scoped("rasterize", || match &t.line_program {
            Some(program) if batch.count > 0 => program.draw(gpu, &t.config, batch, &t.lines),
            _ => t.lines.clear(gpu),
        })?;
        Ok(())
    }

    fn smooth(&mut self) -> Result<()> {
        let t = self.targets.as_ref().ok_or(BackendError::NotConfigured)?;
        match &t.smooth {
            Some(pass) => Self::submit(&self.gpu, "smooth_tiles", |enc| pass.encode(enc, 0)),
            None => Ok(()),
        }
    }

    fn reduce_columns(&mut self) -> Result<()> {
        let t = self.targets.as_ref().ok_or(BackendError::NotConfigured)?;
        Self::submit(&self.gpu, "column_sums", |enc| t.column_sums.encode(enc, 0))
    }

    fn normalize(&mut self) -> Result<()> {
        let t = self.targets.as_mut().ok_or(BackendError::NotConfigured)?;
        let group = t.current;
        Self::submit(&self.gpu, "normalize_accumulate", |enc| t.normalize.encode(enc, group))?;
        t.current = 1 - group;
        Ok(())
    }

    fn merge_tiles(&mut self) -> Result<()> {
        let t = self.targets.as_mut().ok_or(BackendError::NotConfigured)?;
        let current = t.current;
        let (h, v) = (&t.merge_horizontal, &t.merge_vertical);
        Self::submit(&self.gpu, "merge_tiles", |enc| {
            h.encode(enc, current);
            v.encode(enc, 0);
        })?;
        t.merged = true;
        Ok(())
    }

    fn read_heatmap(&mut self) -> Result<Surface<f32>> {
        let t = self.targets.as_ref().ok_or(BackendError::NotConfigured)?;
        if !t.merged {
            return Err(BackendError::Readback("heatmap read before merge_tiles".into()).into());
        }
        Ok(t.heatmap.read_scalar(&self.gpu)?)
    }

    fn read_accumulation(&mut self) -> Result<Surface<Rgba>> {
        let t = self.targets.as_ref().ok_or(BackendError::NotConfigured)?;
        Ok(t.accum[t.current].read_rgba(&self.gpu)?)
    }

    fn release(&mut self) {
        if self.targets.take().is_some() {
            debug!("GPU targets released");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/common/mod.rs"]
mod walks;
