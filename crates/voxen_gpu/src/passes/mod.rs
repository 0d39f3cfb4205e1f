//! Compute pass pipelines of the deferred voxel pipeline.

pub mod blit;
pub mod buffer_march;
pub mod divide;
pub mod interpolate;
pub mod sparse;
pub mod world_pos;

use wgpu::Device;

use crate::gbuffer;

/// Assemble a shader module from the shared prelude, optionally the
/// scene-march library, and the pass body.
pub(crate) fn create_shader(
    device: &Device,
    label: &str,
    body: &str,
    with_march: bool,
) -> wgpu::ShaderModule {
    let mut source = String::from(include_str!("../shaders/shared.wgsl"));
    if with_march {
        source.push('\n');
        source.push_str(include_str!("../shaders/march.wgsl"));
    }
    source.push('\n');
    source.push_str(body);
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

/// Bind group layouts shared by the march passes: the scene group, the
/// G-buffer write group, and the worklist group.
pub struct PassLayouts {
    pub scene: wgpu::BindGroupLayout,
    pub gbuffer_write: wgpu::BindGroupLayout,
    pub worklist: wgpu::BindGroupLayout,
}

impl PassLayouts {
    pub fn new(device: &Device) -> Self {
        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let scene = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Uint,
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(4, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
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

        let storage_texture = |binding: u32, format: wgpu::TextureFormat| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };
        let gbuffer_write = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GBuffer Write Bind Group Layout"),
            entries: &[
                storage_texture(0, gbuffer::ALBEDO_FORMAT),
                storage_texture(1, gbuffer::NORMAL_FORMAT),
                storage_texture(2, gbuffer::DEPTH_FORMAT),
                storage_texture(3, gbuffer::VELOCITY_FORMAT),
            ],
        });

        let worklist = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Worklist Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });

        Self {
            scene,
            gbuffer_write,
            worklist,
        }
    }
}
