//! Shared 3D volume atlas.
//!
//! Every voxel grid in the scene is packed into one `r32uint` 3D
//! texture along +X so the march shaders can sample any object through
//! a single binding. The atlas grows by reallocating a wider texture
//! and copying the old contents; removal zeroes the region but never
//! compacts, so fragmentation accumulates until a rebuild.

use std::collections::HashMap;

use glam::UVec3;
use thiserror::Error;
use voxen_core::{VoxelGrid, BRICK_SIZE};
use wgpu::util::DeviceExt;
use wgpu::{Device, Queue};

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("volume '{0}' already exists in the atlas")]
    DuplicateLabel(String),
    #[error("atlas growth to width {requested} exceeds device limit {limit}")]
    ExceedsDeviceLimit { requested: u32, limit: u32 },
    #[error("no volume '{0}' in the atlas")]
    UnknownLabel(String),
}

/// Placement of one volume inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSlot {
    pub location: UVec3,
    pub size: UVec3,
    /// Row of this volume's palette in the palette texture.
    pub palette_index: u32,
    /// Word offset of this volume's brick map in the shared buffer.
    pub brick_offset: u32,
}

/// CPU-side packing arithmetic, separated from the GPU resources so
/// the append/duplicate/limit behavior is testable without a device.
#[derive(Debug, Clone)]
pub struct AtlasLayout {
    width: u32,
    height: u32,
    depth: u32,
    max_dimension: u32,
    slots: HashMap<String, VolumeSlot>,
    next_palette_index: u32,
    brick_words: u32,
}

impl AtlasLayout {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 0,
            max_dimension,
            slots: HashMap::new(),
            next_palette_index: 0,
            brick_words: 0,
        }
    }

    pub fn extent(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    pub fn get(&self, label: &str) -> Result<&VolumeSlot, AtlasError> {
        self.slots
            .get(label)
            .ok_or_else(|| AtlasError::UnknownLabel(label.to_string()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.slots.contains_key(label)
    }

    /// Reserve space for a volume. All failures happen before any
    /// state mutates.
    pub fn try_add(
        &mut self,
        label: &str,
        size: UVec3,
        brick_word_count: u32,
    ) -> Result<VolumeSlot, AtlasError> {
        if self.slots.contains_key(label) {
            return Err(AtlasError::DuplicateLabel(label.to_string()));
        }
        // Round the footprint up to a brick boundary so neighboring
        // volumes never share a brick.
        let aligned_x = size.x.next_multiple_of(BRICK_SIZE);
        let new_width = self.width + aligned_x;
        let new_height = self.height.max(size.y);
        let new_depth = self.depth.max(size.z);
        let largest = new_width.max(new_height).max(new_depth);
        if largest > self.max_dimension {
            return Err(AtlasError::ExceedsDeviceLimit {
                requested: largest,
                limit: self.max_dimension,
            });
        }

        let slot = VolumeSlot {
            location: UVec3::new(self.width, 0, 0),
            size,
            palette_index: self.next_palette_index,
            brick_offset: self.brick_words,
        };
        self.width = new_width;
        self.height = new_height;
        self.depth = new_depth;
        self.next_palette_index += 1;
        self.brick_words += brick_word_count;
        self.slots.insert(label.to_string(), slot);
        Ok(slot)
    }

    /// Release a label. The region stays allocated (no compaction).
    pub fn remove(&mut self, label: &str) -> Result<VolumeSlot, AtlasError> {
        self.slots
            .remove(label)
            .ok_or_else(|| AtlasError::UnknownLabel(label.to_string()))
    }
}

/// GPU resources backing the layout: the atlas texture, the palette
/// texture (one 256-wide row per volume), and the brick-map buffer.
pub struct VolumeAtlas {
    layout: AtlasLayout,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    palette_texture: wgpu::Texture,
    palette_view: wgpu::TextureView,
    brick_buffer: wgpu::Buffer,
    brick_words: Vec<u32>,
    clear_pipeline: wgpu::ComputePipeline,
    clear_layout: wgpu::BindGroupLayout,
}

const PALETTE_ROWS: u32 = 256;

impl VolumeAtlas {
    pub fn new(device: &Device) -> Self {
        let max_dimension = device.limits().max_texture_dimension_3d;
        let texture = create_atlas_texture(device, UVec3::new(BRICK_SIZE, BRICK_SIZE, BRICK_SIZE));
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let palette_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Palette Texture"),
            size: wgpu::Extent3d {
                width: 256,
                height: PALETTE_ROWS,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let palette_view = palette_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let brick_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Brick Map Buffer"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Clear Volume Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/clear_volume.wgsl").into()),
        });
        let clear_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clear Volume Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::R32Uint,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Clear Volume Pipeline Layout"),
            bind_group_layouts: &[&clear_layout],
            push_constant_ranges: &[],
        });
        let clear_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Clear Volume Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            layout: AtlasLayout::new(max_dimension),
            texture,
            view,
            palette_texture,
            palette_view,
            brick_buffer,
            brick_words: Vec::new(),
            clear_pipeline,
            clear_layout,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn palette_view(&self) -> &wgpu::TextureView {
        &self.palette_view
    }

    pub fn brick_buffer(&self) -> &wgpu::Buffer {
        &self.brick_buffer
    }

    pub fn get_volume(&self, label: &str) -> Result<&VolumeSlot, AtlasError> {
        self.layout.get(label)
    }

    pub fn extent(&self) -> UVec3 {
        self.layout.extent()
    }

    /// Copy a grid into the atlas, growing the texture if needed.
    ///
    /// Growth reallocates, copies the old contents, and blocks until
    /// the copy completes. Infrequent (scene changes only), so the
    /// stall is acceptable.
    pub fn add_volume(
        &mut self,
        device: &Device,
        queue: &Queue,
        grid: &VoxelGrid,
        label: &str,
    ) -> Result<VolumeSlot, AtlasError> {
        let brick_map = grid.build_brick_map();
        let slot = self
            .layout
            .try_add(label, grid.size, brick_map.len() as u32)?;

        let old_extent = self.texture.size();
        let new_extent = self.layout.extent();
        if new_extent.x > old_extent.width
            || new_extent.y > old_extent.height
            || new_extent.z > old_extent.depth_or_array_layers
        {
            self.grow(device, queue, new_extent);
        }

        // Widen palette indices to r32uint texels.
        let texels: Vec<u32> = grid.voxels().iter().map(|&v| v as u32).collect();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: slot.location.x,
                    y: slot.location.y,
                    z: slot.location.z,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(grid.size.x * 4),
                rows_per_image: Some(grid.size.y),
            },
            wgpu::Extent3d {
                width: grid.size.x,
                height: grid.size.y,
                depth_or_array_layers: grid.size.z,
            },
        );

        // Palette row for this volume.
        let palette_bytes: Vec<u8> = grid.palette.iter().flatten().copied().collect();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.palette_texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: slot.palette_index,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &palette_bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(256 * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 256,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        // Append the brick map; the storage buffer is recreated when
        // it grows, same realloc-and-copy discipline as the texture.
        self.brick_words.extend_from_slice(&brick_map);
        self.brick_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Brick Map Buffer"),
            contents: bytemuck::cast_slice(&self.brick_words),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        log::info!(
            "atlas: added '{label}' {:?} at {:?} (atlas now {:?})",
            grid.size,
            slot.location,
            new_extent
        );
        Ok(slot)
    }

    /// Zero a volume's region with a compute dispatch and drop its
    /// label. The space is not reclaimed.
    pub fn remove_volume(
        &mut self,
        device: &Device,
        queue: &Queue,
        label: &str,
    ) -> Result<(), AtlasError> {
        let slot = self.layout.remove(label)?;

        let region = RegionUniform {
            origin: slot.location.to_array(),
            _pad0: 0,
            size: slot.size.to_array(),
            _pad1: 0,
        };
        let region_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Clear Region Buffer"),
            contents: bytemuck::bytes_of(&region),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clear Volume Bind Group"),
            layout: &self.clear_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: region_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Clear Volume Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Clear Volume Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.clear_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                slot.size.x.div_ceil(4),
                slot.size.y.div_ceil(4),
                slot.size.z.div_ceil(4),
            );
        }
        queue.submit(std::iter::once(encoder.finish()));

        log::info!("atlas: removed '{label}', region {:?} zeroed", slot.location);
        Ok(())
    }

    fn grow(&mut self, device: &Device, queue: &Queue, new_extent: UVec3) {
        let old_extent = self.texture.size();
        let new_texture = create_atlas_texture(device, new_extent);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Atlas Grow Encoder"),
        });
        encoder.copy_texture_to_texture(
            self.texture.as_image_copy(),
            new_texture.as_image_copy(),
            old_extent,
        );
        let index = queue.submit(std::iter::once(encoder.finish()));
        // Block until the old contents land in the new texture; the
        // old texture is dropped right after.
        device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));

        self.view = new_texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.texture = new_texture;
        log::debug!(
            "atlas: grew from {}x{}x{} to {:?}",
            old_extent.width,
            old_extent.height,
            old_extent.depth_or_array_layers,
            new_extent
        );
    }
}

fn create_atlas_texture(device: &Device, extent: UVec3) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Volume Atlas"),
        size: wgpu::Extent3d {
            width: extent.x,
            height: extent.y,
            depth_or_array_layers: extent.z,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: wgpu::TextureFormat::R32Uint,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct RegionUniform {
    origin: [u32; 3],
    _pad0: u32,
    size: [u32; 3],
    _pad1: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_append_invariant() {
        let mut layout = AtlasLayout::new(2048);
        let slot = layout.try_add("a", UVec3::new(10, 8, 8), 2).unwrap();
        assert_eq!(slot.location, UVec3::ZERO);
        // 10 rounds up to 12 for brick alignment
        assert_eq!(layout.extent(), UVec3::new(12, 8, 8));
        assert!(slot.location.x + slot.size.x <= layout.extent().x);

        let second = layout.try_add("b", UVec3::new(8, 16, 4), 1).unwrap();
        assert_eq!(second.location, UVec3::new(12, 0, 0));
        assert_eq!(layout.extent(), UVec3::new(20, 16, 8));
        assert!(second.location.x + second.size.x <= layout.extent().x);
    }

    #[test]
    fn test_duplicate_label_rejected_before_mutation() {
        let mut layout = AtlasLayout::new(2048);
        layout.try_add("a", UVec3::splat(8), 1).unwrap();
        let extent = layout.extent();
        let err = layout.try_add("a", UVec3::splat(8), 1);
        assert!(matches!(err, Err(AtlasError::DuplicateLabel(_))));
        assert_eq!(layout.extent(), extent);
    }

    #[test]
    fn test_growth_past_limit_rejected_before_mutation() {
        let mut layout = AtlasLayout::new(16);
        layout.try_add("a", UVec3::splat(12), 1).unwrap();
        let extent = layout.extent();
        let err = layout.try_add("b", UVec3::splat(8), 1);
        assert!(matches!(err, Err(AtlasError::ExceedsDeviceLimit { .. })));
        assert_eq!(layout.extent(), extent);
        assert!(layout.contains("a"));
        assert!(!layout.contains("b"));
    }

    #[test]
    fn test_remove_unknown_label() {
        let mut layout = AtlasLayout::new(2048);
        assert!(matches!(
            layout.remove("ghost"),
            Err(AtlasError::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_brick_and_palette_offsets_accumulate() {
        let mut layout = AtlasLayout::new(2048);
        let a = layout.try_add("a", UVec3::splat(8), 3).unwrap();
        let b = layout.try_add("b", UVec3::splat(8), 5).unwrap();
        assert_eq!(a.brick_offset, 0);
        assert_eq!(b.brick_offset, 3);
        assert_eq!(a.palette_index, 0);
        assert_eq!(b.palette_index, 1);
    }

    #[test]
    fn test_removed_region_is_not_reused() {
        let mut layout = AtlasLayout::new(2048);
        layout.try_add("a", UVec3::splat(8), 1).unwrap();
        layout.remove("a").unwrap();
        // No compaction: the next volume packs after the dead region.
        let b = layout.try_add("b", UVec3::splat(8), 1).unwrap();
        assert_eq!(b.location.x, 8);
    }
}
