// gpu/lines.rs — Line-strip rasterization on the GPU.
//
// One render pipeline per color-write mask (RED, GREEN, BLUE, ALPHA): a
// series in channel c is drawn with pipeline c, so four series share a
// texel without touching each other's channel. Each series is one instance
// of a 2 * NUM_POINTS vertex triangle strip; the vertex stage reads its
// samples from a storage buffer and extrudes the stroke (shaders/lines.wgsl,
// same geometry as `raster::stroke_vertices`).
//
// A per-draw scissor rectangle confines the series to its tile.
//
// CHUNKING
// ────────
// A batch's samples may exceed `max_storage_buffer_binding_size`. The batch
// is then uploaded in chunks of whole series; each chunk is its own submit
// with its own `slot_base`. Only the first chunk clears the target.

use wgpu::util::DeviceExt;

use crate::backend::{Batch, PassConfig};
use crate::error::BackendError;
use crate::gpu::device::GpuDevice;
use crate::gpu::passes::{bind_group, bind_group_layout, templates, BindingKind, ShaderConstants};
use crate::gpu::target::RenderTarget;
use crate::tiling::CHANNELS;

/// Line program uniforms.
///
/// Layout must match `LineParams` in `lines.wgsl`:
///   offset  0: x_start, x_step, y_start, y_step (4 × f32)
///   offset 16: half_width, tangent_extent       (2 × f32)
///   offset 24: slot_base                        (u32)
///   offset 28: _pad                             (u32)
///   total:  32 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LineParams {
    x_start:        f32,
    x_step:         f32,
    y_start:        f32,
    y_step:         f32,
    half_width:     f32,
    tangent_extent: f32,
    slot_base:      u32,
    _pad:           u32,
}

impl LineParams {
    fn new(config: &PassConfig, slot_base: u32) -> Self {
        LineParams {
            x_start: config.mapping.x_start,
            x_step: config.mapping.x_step,
            y_start: config.mapping.y_start,
            y_step: config.mapping.y_step,
            half_width: config.stroke.half_width,
            tangent_extent: config.stroke.tangent_extent,
            slot_base,
            _pad: 0,
        }
    }
}

const CHANNEL_MASKS: [wgpu::ColorWrites; CHANNELS as usize] = [
    wgpu::ColorWrites::RED,
    wgpu::ColorWrites::GREEN,
    wgpu::ColorWrites::BLUE,
    wgpu::ColorWrites::ALPHA,
];

/// Compiled line programs for one pass configuration.
pub struct LineProgram {
    pipelines: Vec<wgpu::RenderPipeline>,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    /// Whole series per upload chunk.
    chunk_series: usize,
}

impl LineProgram {
    pub fn new(gpu: &GpuDevice, config: &PassConfig, constants: &ShaderConstants) -> Result<Self, BackendError> {
        let source = constants.apply(templates::LINES);
        let series_bytes = (config.num_points * std::mem::size_of::<f32>()) as u64;
        let chunk_series = (gpu.max_storage_binding() / series_bytes.max(1)).max(1) as usize;

        gpu.scoped("line programs", || {
            let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("lines.wgsl"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let layout = bind_group_layout(
                gpu,
                "LineProgram BGL",
                &[BindingKind::Uniform, BindingKind::ReadOnlyBuffer],
                wgpu::ShaderStages::VERTEX,
            );
            let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("LineProgram pipeline layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

            let pipelines = CHANNEL_MASKS
                .iter()
                .map(|&mask| {
                    gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label:  Some("lines"),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module:              &shader,
                            entry_point:         "vs_main",
                            buffers:             &[],
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module:              &shader,
                            entry_point:         "fs_main",
                            targets:             &[Some(wgpu::ColorTargetState {
                                format:     wgpu::TextureFormat::Rgba32Float,
                                blend:      None,
                                write_mask: mask,
                            })],
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology:  wgpu::PrimitiveTopology::TriangleStrip,
                            cull_mode: None,
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample:   wgpu::MultisampleState::default(),
                        multiview:     None,
                        cache:         None,
                    })
                })
                .collect();

            let params = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label:              Some("LineParams"),
                size:               std::mem::size_of::<LineParams>() as u64,
                usage:              wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            LineProgram { pipelines, layout, params, chunk_series }
        })
    }

    /// Clear `target` and draw every series of `batch` into its slot.
    pub fn draw(
        &self,
        gpu: &GpuDevice,
        config: &PassConfig,
        batch: &Batch<'_>,
        target: &RenderTarget,
    ) {
        let n = config.num_points;
        let layout = &config.layout;
        let mut first = 0usize;
        loop {
            let count = self.chunk_series.min(batch.count - first);
            let chunk = &batch.values[first * n..(first + count) * n];
            gpu.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&LineParams::new(config, first as u32)));

            // An empty batch still needs one pass to clear the target.
            let samples = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("line samples"),
                contents: if chunk.is_empty() { &[0u8; 4][..] } else { bytemuck::cast_slice(chunk) },
                usage: wgpu::BufferUsages::STORAGE,
            });
            let group = bind_group(
                gpu,
                "LineProgram bind group",
                &self.layout,
                &[self.params.as_entire_binding(), samples.as_entire_binding()],
            );

            let mut encoder = gpu.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor { label: Some("LineProgram::draw") },
            );
            {
                let load = if first == 0 {
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                } else {
                    wgpu::LoadOp::Load
                };
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("lines"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.view,
                        resolve_target: None,
                        ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_bind_group(0, &group, &[]);
                if n >= 2 {
                    let vertices = 2 * n as u32;
                    for s in 0..count {
                        let slot = layout.slot(first + s);
                        let rect = layout.tile_rect(slot.column, slot.row);
                        pass.set_pipeline(&self.pipelines[slot.channel as usize]);
                        pass.set_scissor_rect(rect.x0, rect.y0, rect.width, rect.height);
                        pass.draw(0..vertices, s as u32..s as u32 + 1);
                    }
                }
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));

            first += count;
            if first >= batch.count {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_params_layout() {
        assert_eq!(std::mem::size_of::<LineParams>(), 32);
    }

    #[test]
    fn test_channel_masks_are_disjoint() {
        let mut all = wgpu::ColorWrites::empty();
        for m in CHANNEL_MASKS {
            assert!(!all.intersects(m));
            all |= m;
        }
        assert_eq!(all, wgpu::ColorWrites::ALL);
    }
}
