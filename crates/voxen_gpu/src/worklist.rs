//! Screen-ray worklist: the queue of pixels that need a full-cost
//! march, shared by the sparse and interpolation passes (producers)
//! and the indirect buffer-march pass (consumer).

use wgpu::util::DeviceExt;
use wgpu::Device;

/// Pixel tile edge sampled by the sparse pass (one ray per tile).
pub const TILE_SIZE: u32 = 3;
/// Workgroup width of the buffer-march pass; the divide pass converts
/// the counter into `ceil(count / MARCH_WORKGROUP_SIZE)` workgroups.
pub const MARCH_WORKGROUP_SIZE: u32 = 64;

/// Upper bound on worklist entries for a render resolution: one per
/// 3x3 tile. Producers that fill the list past this drop the append
/// and the pixel keeps its interpolated estimate for the frame.
pub fn max_screen_rays(width: u32, height: u32) -> u32 {
    width.div_ceil(TILE_SIZE) * height.div_ceil(TILE_SIZE)
}

/// Worklist entries pack a pixel coordinate as `x | y << 16`.
pub struct ScreenRayWorklist {
    pub ray_buffer: wgpu::Buffer,
    pub counter_buffer: wgpu::Buffer,
    pub indirect_buffer: wgpu::Buffer,
    pub capacity_buffer: wgpu::Buffer,
    capacity: u32,
}

impl ScreenRayWorklist {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let capacity = max_screen_rays(width, height);
        let ray_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Screen Ray Buffer"),
            size: capacity as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Screen Ray Counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let indirect_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("March Indirect Args"),
            size: 12,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let capacity_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Worklist Capacity"),
            contents: bytemuck::bytes_of(&capacity),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        Self {
            ray_buffer,
            counter_buffer,
            indirect_buffer,
            capacity_buffer,
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reset the counter and indirect args. Must be encoded before the
    /// sparse pass that repopulates them each frame.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.counter_buffer, 0, None);
        encoder.clear_buffer(&self.indirect_buffer, 0, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_screen_rays_exact_tiles() {
        // 1920/3 = 640, 1080/3 = 360 tiles
        assert_eq!(max_screen_rays(1920, 1080), 640 * 360);
    }

    #[test]
    fn test_max_screen_rays_rounds_tiles_up() {
        assert_eq!(max_screen_rays(4, 4), 4);
        assert_eq!(max_screen_rays(1, 1), 1);
    }

    #[test]
    fn test_max_screen_rays_covers_every_tile_center() {
        for (w, h) in [(640u32, 480u32), (1279, 719), (3, 3), (5, 7)] {
            let tiles = w.div_ceil(3) * h.div_ceil(3);
            assert_eq!(max_screen_rays(w, h), tiles, "{w}x{h}");
        }
    }
}
