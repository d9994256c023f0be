// gpu/passes.rs — Compute passes: smoothing, column sums, normalization,
// tile merges.
//
// Each pass is a WGSL template specialized for one invocation. Sizes are
// substituted as literals (`{{TILE_WIDTH}}` → `128`) rather than passed in
// uniforms, so every loop bound is a constant the compiler can see:
//
//   TILE_WIDTH  TILE_HEIGHT  TARGET_WIDTH  TARGET_HEIGHT
//   REPEATS_X   REPEATS_Y    NUM_POINTS    KERNEL_SIZE    WG_X  WG_Y
//
// All passes read `texture_2d<f32>` inputs with `textureLoad` (no sampler,
// no filtering) and write one storage texture.

use crate::backend::PassConfig;
use crate::error::BackendError;
use crate::gpu::device::GpuDevice;

/// Template values for one pass configuration.
#[derive(Debug, Clone)]
pub struct ShaderConstants {
    values: Vec<(&'static str, String)>,
}

impl ShaderConstants {
    pub fn for_config(config: &PassConfig) -> Self {
        let l = &config.layout;
        let kernel_size = config.kernel.as_ref().map_or(1, |k| k.size());
        ShaderConstants {
            values: vec![
                ("TILE_WIDTH", l.tile_width.to_string()),
                ("TILE_HEIGHT", l.tile_height.to_string()),
                ("TARGET_WIDTH", l.target_width().to_string()),
                ("TARGET_HEIGHT", l.target_height().to_string()),
                ("REPEATS_X", l.repeats_x.to_string()),
                ("REPEATS_Y", l.repeats_y.to_string()),
                ("NUM_POINTS", config.num_points.to_string()),
                ("KERNEL_SIZE", kernel_size.to_string()),
            ],
        }
    }

    /// Replace every `{{NAME}}` token of `template`.
    pub fn apply(&self, template: &str) -> String {
        self.values
            .iter()
            .fold(template.to_string(), |src, (name, value)| {
                src.replace(&format!("{{{{{name}}}}}"), value)
            })
    }
}

/// How a compute shader binding is declared.
#[derive(Debug, Clone, Copy)]
pub enum BindingKind {
    /// `texture_2d<f32>`, read with `textureLoad`.
    Texture,
    /// `texture_storage_2d<format, write>`.
    StorageTexture(wgpu::TextureFormat),
    /// `var<storage, read>` buffer.
    ReadOnlyBuffer,
    /// `var<uniform>` buffer.
    Uniform,
}

impl BindingKind {
    fn layout_entry(self, binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            BindingKind::Texture => wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
            },
            BindingKind::StorageTexture(format) => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            BindingKind::ReadOnlyBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        };
        wgpu::BindGroupLayoutEntry { binding, visibility, ty, count: None }
    }
}

/// Build a bind group layout with bindings `0..kinds.len()`.
pub fn bind_group_layout(
    gpu: &GpuDevice,
    label: &str,
    kinds: &[BindingKind],
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = kinds
        .iter()
        .enumerate()
        .map(|(i, k)| k.layout_entry(i as u32, visibility))
        .collect();
    gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Build a bind group whose entries are bound at `0..resources.len()`.
pub fn bind_group(
    gpu: &GpuDevice,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    resources: &[wgpu::BindingResource<'_>],
) -> wgpu::BindGroup {
    let entries: Vec<_> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| wgpu::BindGroupEntry { binding: i as u32, resource: r.clone() })
        .collect();
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// A compiled compute program plus the bind groups it is dispatched with.
pub struct ComputePass {
    label: &'static str,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bind_groups: Vec<wgpu::BindGroup>,
    dispatch: (u32, u32),
}

impl ComputePass {
    /// Specialize and compile `template`, whose entry point is `label`.
    /// `extent` is the output grid the dispatch must cover.
    pub fn new(
        gpu: &GpuDevice,
        label: &'static str,
        template: &str,
        constants: &ShaderConstants,
        kinds: &[BindingKind],
        extent: (u32, u32),
    ) -> Result<Self, BackendError> {
        let source = gpu.workgroup_size.specialize(&constants.apply(template));
        gpu.scoped(label, || {
            let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let layout = bind_group_layout(gpu, label, kinds, wgpu::ShaderStages::COMPUTE);
            let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label:               Some(label),
                layout:              Some(&pipeline_layout),
                module:              &shader,
                entry_point:         label,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache:               None,
            });
            ComputePass {
                label,
                pipeline,
                layout,
                bind_groups: Vec::new(),
                dispatch: gpu.dispatch_size(extent.0, extent.1),
            }
        })
    }

    /// Register a bind group; returns its index for [`encode`](Self::encode).
    pub fn add_bind_group(&mut self, gpu: &GpuDevice, resources: &[wgpu::BindingResource<'_>]) -> usize {
        let group = bind_group(gpu, self.label, &self.layout, resources);
        self.bind_groups.push(group);
        self.bind_groups.len() - 1
    }

    /// Record one dispatch with bind group `group`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, group: usize) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[group], &[]);
        pass.dispatch_workgroups(self.dispatch.0, self.dispatch.1, 1);
    }
}

/// The template of each pass, keyed by entry point.
pub mod templates {
    pub const SMOOTH: &str = include_str!("../shaders/smooth.wgsl");
    pub const COLUMN_SUMS: &str = include_str!("../shaders/column_sums.wgsl");
    pub const NORMALIZE: &str = include_str!("../shaders/normalize.wgsl");
    pub const MERGE_HORIZONTAL: &str = include_str!("../shaders/merge_horizontal.wgsl");
    pub const MERGE_VERTICAL: &str = include_str!("../shaders/merge_vertical.wgsl");
    pub const LINES: &str = include_str!("../shaders/lines.wgsl");
}
