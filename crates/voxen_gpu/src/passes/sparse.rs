use wgpu::Device;

use super::{create_shader, PassLayouts};
use crate::worklist::TILE_SIZE;

/// Sparse primary raymarch: one ray per 3x3 pixel tile.
pub struct SparsePass {
    pipeline: wgpu::ComputePipeline,
}

impl SparsePass {
    pub fn new(device: &Device, layouts: &PassLayouts) -> Self {
        let shader = create_shader(
            device,
            "Sparse Raymarch Shader",
            include_str!("../shaders/sparse_raymarch.wgsl"),
            true,
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sparse Raymarch Pipeline Layout"),
            bind_group_layouts: &[&layouts.scene, &layouts.gbuffer_write, &layouts.worklist],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Sparse Raymarch Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: Default::default(),
            cache: None,
        });
        Self { pipeline }
    }

    pub fn record(
        &self,
        pass: &mut wgpu::ComputePass,
        scene: &wgpu::BindGroup,
        gbuffer_write: &wgpu::BindGroup,
        worklist: &wgpu::BindGroup,
        size: (u32, u32),
    ) {
        let tiles_x = size.0.div_ceil(TILE_SIZE);
        let tiles_y = size.1.div_ceil(TILE_SIZE);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, scene, &[]);
        pass.set_bind_group(1, gbuffer_write, &[]);
        pass.set_bind_group(2, worklist, &[]);
        pass.dispatch_workgroups(tiles_x.div_ceil(16), tiles_y.div_ceil(8), 1);
    }
}
