use wgpu::Device;

use super::{create_shader, PassLayouts};

/// Full-cost march over the queued pixels, dispatched indirectly.
pub struct BufferMarchPass {
    pipeline: wgpu::ComputePipeline,
}

impl BufferMarchPass {
    pub fn new(device: &Device, layouts: &PassLayouts) -> Self {
        let shader = create_shader(
            device,
            "Buffer Raymarch Shader",
            include_str!("../shaders/buffer_raymarch.wgsl"),
            true,
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Buffer Raymarch Pipeline Layout"),
            bind_group_layouts: &[&layouts.scene, &layouts.gbuffer_write, &layouts.worklist],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Buffer Raymarch Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: Default::default(),
            cache: None,
        });
        Self { pipeline }
    }

    /// Workgroup count comes from the indirect args the divide pass
    /// wrote earlier in the same command buffer.
    pub fn record(
        &self,
        pass: &mut wgpu::ComputePass,
        scene: &wgpu::BindGroup,
        gbuffer_write: &wgpu::BindGroup,
        worklist: &wgpu::BindGroup,
        indirect_buffer: &wgpu::Buffer,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, scene, &[]);
        pass.set_bind_group(1, gbuffer_write, &[]);
        pass.set_bind_group(2, worklist, &[]);
        pass.dispatch_workgroups_indirect(indirect_buffer, 0);
    }
}
