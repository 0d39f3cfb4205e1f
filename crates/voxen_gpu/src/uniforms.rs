use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use voxen_core::{Bvh, RenderSettings, SceneView, VoxelObject, VOXEL_OBJECT_STRIDE};
use voxen_math::Camera;
use wgpu::util::DeviceExt;
use wgpu::{Device, Queue};

/// Per-frame uniform block shared by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub previous_view_projection: [[f32; 4]; 4],
    pub inverse_view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub time: f32,
    pub resolution: [f32; 2],
    pub frame_index: u32,
    pub max_march_steps: u32,
    pub depth_tolerance: f32,
    pub normal_tolerance: f32,
    pub _pad: [f32; 2],
}

impl FrameUniforms {
    pub fn new(
        camera: &Camera,
        previous_view_projection: Mat4,
        settings: &RenderSettings,
        resolution: (u32, u32),
        time: f32,
        frame_index: u32,
    ) -> Self {
        Self {
            view_projection: camera.view_projection_matrix().to_cols_array_2d(),
            previous_view_projection: previous_view_projection.to_cols_array_2d(),
            inverse_view_projection: camera.inverse_view_projection_matrix().to_cols_array_2d(),
            camera_position: camera.position.to_array(),
            time,
            resolution: [resolution.0 as f32, resolution.1 as f32],
            frame_index,
            max_march_steps: settings.max_march_steps,
            depth_tolerance: settings.deferral.depth_tolerance,
            normal_tolerance: settings.deferral.normal_tolerance,
            _pad: [0.0; 2],
        }
    }
}

/// GPU copies of the scene: the BVH node buffer and the voxel-object
/// record buffer the march shaders index.
pub struct SceneBuffers {
    pub bvh_buffer: wgpu::Buffer,
    pub object_buffer: wgpu::Buffer,
    pub object_count: u32,
}

impl SceneBuffers {
    /// Build the GPU scene from a view. Objects whose volume is missing
    /// from the atlas are logged and skipped; the BVH is built over the
    /// surviving set so leaf indices line up with the record buffer.
    pub fn build(
        device: &Device,
        view: &SceneView,
        atlas: &crate::VolumeAtlas,
    ) -> Self {
        let mut retained: Vec<VoxelObject> = Vec::with_capacity(view.objects.len());
        for object in view.objects {
            match atlas.get_volume(&object.volume_label) {
                Ok(slot) => {
                    let mut object = object.clone();
                    object.atlas_location = slot.location;
                    object.palette_index = slot.palette_index;
                    object.brick_offset = slot.brick_offset;
                    retained.push(object);
                }
                Err(_) => {
                    log::warn!(
                        "scene object references volume '{}' not present in the atlas, skipping",
                        object.volume_label
                    );
                }
            }
        }

        let retained_view = SceneView {
            grids: view.grids,
            objects: &retained,
        };
        let bvh = Bvh::build(&retained_view);
        let mut bvh_bytes = bvh.to_bytes();
        // wgpu rejects zero-sized buffers; an empty scene keeps one
        // zeroed record and the frame graph skips the dispatches.
        if bvh_bytes.is_empty() {
            bvh_bytes = vec![0u8; voxen_core::BVH_NODE_STRIDE];
        }
        let bvh_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("BVH Node Buffer"),
            contents: &bvh_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let records: Vec<u8> = if retained.is_empty() {
            vec![0u8; VOXEL_OBJECT_STRIDE]
        } else {
            retained
                .iter()
                .flat_map(|o| bytemuck::bytes_of(&o.to_record()).to_vec())
                .collect()
        };
        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Object Buffer"),
            contents: &records,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            bvh_buffer,
            object_buffer,
            object_count: retained.len() as u32,
        }
    }
}

const BLUE_NOISE_SIZE: u32 = 64;

/// Small tiling noise texture for dithering the deferral predicate so
/// its rejection boundary does not band.
pub fn create_blue_noise_texture(device: &Device, queue: &Queue) -> wgpu::TextureView {
    let mut data = vec![0u8; (BLUE_NOISE_SIZE * BLUE_NOISE_SIZE) as usize];
    for y in 0..BLUE_NOISE_SIZE {
        for x in 0..BLUE_NOISE_SIZE {
            // Interleaved gradient noise; tiles acceptably at 64px.
            let v = (52.9829189 * (0.06711056 * x as f32 + 0.00583715 * y as f32).fract()).fract();
            data[(y * BLUE_NOISE_SIZE + x) as usize] = (v * 255.0) as u8;
        }
    }
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("Blue Noise Texture"),
            size: wgpu::Extent3d {
                width: BLUE_NOISE_SIZE,
                height: BLUE_NOISE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
