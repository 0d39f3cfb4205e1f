use wgpu::Device;

use super::{create_shader, PassLayouts};

/// Densify pass: fills non-center pixels from the surrounding tile
/// centers, deferring disagreements to the buffer march.
pub struct InterpolatePass {
    pipeline: wgpu::ComputePipeline,
    pub frame_layout: wgpu::BindGroupLayout,
    pub history_layout: wgpu::BindGroupLayout,
}

impl InterpolatePass {
    pub fn new(device: &Device, layouts: &PassLayouts) -> Self {
        let shader = create_shader(
            device,
            "Interpolation Shader",
            include_str!("../shaders/interpolate.wgsl"),
            false,
        );

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Interpolation Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let history_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let history_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Interpolation History Bind Group Layout"),
            entries: &[
                history_entry(0),
                history_entry(1),
                history_entry(2),
                history_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Interpolation Pipeline Layout"),
            bind_group_layouts: &[
                &frame_layout,
                &history_layout,
                &layouts.gbuffer_write,
                &layouts.worklist,
            ],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Interpolation Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            frame_layout,
            history_layout,
        }
    }

    pub fn record(
        &self,
        pass: &mut wgpu::ComputePass,
        frame: &wgpu::BindGroup,
        history: &wgpu::BindGroup,
        gbuffer_write: &wgpu::BindGroup,
        worklist: &wgpu::BindGroup,
        size: (u32, u32),
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame, &[]);
        pass.set_bind_group(1, history, &[]);
        pass.set_bind_group(2, gbuffer_write, &[]);
        pass.set_bind_group(3, worklist, &[]);
        pass.dispatch_workgroups(size.0.div_ceil(16), size.1.div_ceil(8), 1);
    }
}
