// gpu/target.rs — Render targets and blocking readback.
//
// Every intermediate buffer of the pipeline is a 2D float texture:
//
//   Rgba32Float — line, smoothed, column-sum, accumulation (×2), horizontal
//                 merge; one series per channel
//   R32Float    — final merged heatmap
//
// wgpu zero-initializes textures on creation, so a freshly allocated
// accumulation target is already cleared.
//
// READBACK
// ────────
// `copy_texture_to_buffer` requires `bytes_per_row` to be a multiple of
// COPY_BYTES_PER_ROW_ALIGNMENT (256). The staging buffer is therefore
// padded per row, and the padding is stripped on the host:
//
//   staging row y: [ texel 0 .. texel w-1 | padding up to 256-byte multiple ]

use crate::error::BackendError;
use crate::gpu::device::GpuDevice;
use crate::surface::{Rgba, Surface};

/// Usage shared by every pass target: sampled by later passes, written by
/// compute shaders, copied out for readback.
pub const PASS_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC);

/// A float texture plus the view every pass binds.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl RenderTarget {
    pub fn new(
        gpu: &GpuDevice,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label:           Some(label),
            size:            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count:    1,
            dimension:       wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats:    &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        RenderTarget { texture, view, width, height, format }
    }

    /// Rgba32Float pass target.
    pub fn rgba(gpu: &GpuDevice, label: &str, width: u32, height: u32) -> Self {
        Self::new(gpu, label, width, height, wgpu::TextureFormat::Rgba32Float, PASS_USAGE)
    }

    /// R32Float pass target.
    pub fn scalar(gpu: &GpuDevice, label: &str, width: u32, height: u32) -> Self {
        Self::new(gpu, label, width, height, wgpu::TextureFormat::R32Float, PASS_USAGE)
    }

    /// Zero a render-attachment target.
    pub fn clear(&self, gpu: &GpuDevice) {
        let mut encoder = gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("RenderTarget::clear") },
        );
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Read an Rgba32Float target back to the host. Blocks until the GPU
    /// has finished every submitted command.
    pub fn read_rgba(&self, gpu: &GpuDevice) -> Result<Surface<Rgba>, BackendError> {
        let floats = self.read_floats(gpu, 4)?;
        let texels = floats.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect();
        Ok(Surface::from_vec(self.width as usize, self.height as usize, texels))
    }

    /// Read an R32Float target back to the host.
    pub fn read_scalar(&self, gpu: &GpuDevice) -> Result<Surface<f32>, BackendError> {
        let floats = self.read_floats(gpu, 1)?;
        Ok(Surface::from_vec(self.width as usize, self.height as usize, floats))
    }

    fn read_floats(&self, gpu: &GpuDevice, channels: u32) -> Result<Vec<f32>, BackendError> {
        let row_bytes = self.width * channels * 4;
        let aligned_bytes_per_row = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback_size = aligned_bytes_per_row as u64 * self.height as u64;

        let readback_buf = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label:              Some("RenderTarget::readback"),
            size:               readback_size,
            usage:              wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("RenderTarget::readback") },
        );
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let buf_slice = readback_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| BackendError::Readback("map callback never fired".into()))?
            .map_err(|e| BackendError::Readback(e.to_string()))?;

        let mapped = buf_slice.get_mapped_range();
        let mut out = Vec::with_capacity((self.width * self.height * channels) as usize);
        for y in 0..self.height as usize {
            let start = y * aligned_bytes_per_row as usize;
            let row = &mapped[start..start + row_bytes as usize];
            out.extend(bytemuck::pod_collect_to_vec::<u8, f32>(row));
        }
        drop(mapped);
        readback_buf.unmap();
        Ok(out)
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(100, 256) = 256
///   align_to(256, 256) = 256
///   align_to(257, 256) = 512
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
