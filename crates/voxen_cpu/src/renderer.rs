//! Parallel albedo renderer over the bucket pool.

use glam::Vec3;
use rayon::prelude::*;
use voxen_core::{Bvh, SceneView};
use voxen_math::Camera;

use crate::bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};
use crate::raymarch::march_scene;

pub type Color = Vec3;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub bucket_size: u32,
}

impl RenderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

/// Albedo image produced by the CPU path; the counterpart of the GPU
/// G-buffer's albedo channel.
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// 8-bit RGBA bytes for display or saving.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for color in &self.pixels {
            let c = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            bytes.extend_from_slice(&[c.x as u8, c.y as u8, c.z as u8, 255]);
        }
        bytes
    }
}

/// Sky gradient used for rays that miss everything. Matches the
/// sparse-raymarch shader's miss path.
pub fn sky_color(direction: Vec3) -> Color {
    let a = 0.5 * (direction.normalize().y + 1.0);
    Vec3::ONE * (1.0 - a) + Vec3::new(0.5, 0.7, 1.0) * a
}

fn render_pixel(camera: &Camera, view: &SceneView, bvh: &Bvh, x: u32, y: u32, config: &RenderConfig) -> Color {
    let uv = glam::Vec2::new(
        (x as f32 + 0.5) / config.width as f32,
        (y as f32 + 0.5) / config.height as f32,
    );
    let ray = camera.ray_for_uv(uv);
    match march_scene(&ray, view, bvh) {
        Some((object_index, hit)) => {
            let object = &view.objects[object_index];
            match view.grid_for(object) {
                Some(grid) => {
                    let c = grid.color(hit.palette_index);
                    Vec3::new(c[0], c[1], c[2])
                }
                None => sky_color(ray.direction),
            }
        }
        None => sky_color(ray.direction),
    }
}

fn render_bucket(
    bucket: &Bucket,
    camera: &Camera,
    view: &SceneView,
    bvh: &Bvh,
    config: &RenderConfig,
) -> Vec<Color> {
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);
    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            pixels.push(render_pixel(
                camera,
                view,
                bvh,
                bucket.x + local_x,
                bucket.y + local_y,
                config,
            ));
        }
    }
    pixels
}

/// Render the scene on the rayon pool, one task per bucket.
pub fn render(camera: &Camera, view: &SceneView, bvh: &Bvh, config: &RenderConfig) -> ImageBuffer {
    let buckets = generate_buckets(config.width, config.height, config.bucket_size);
    log::debug!(
        "cpu render {}x{} in {} buckets",
        config.width,
        config.height,
        buckets.len()
    );

    let results: Vec<(Bucket, Vec<Color>)> = buckets
        .par_iter()
        .map(|bucket| (*bucket, render_bucket(bucket, camera, view, bvh, config)))
        .collect();

    let mut image = ImageBuffer::new(config.width, config.height);
    for (bucket, pixels) in results {
        for local_y in 0..bucket.height {
            for local_x in 0..bucket.width {
                let color = pixels[(local_y * bucket.width + local_x) as usize];
                image.set(bucket.x + local_x, bucket.y + local_y, color);
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, UVec3};
    use voxen_core::{Scene, VoxelGrid, VoxelObject};

    fn test_scene() -> Scene {
        let mut scene = Scene::new("cpu-render");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(16), 255));
        scene.add_object(VoxelObject::new(
            grid,
            "white-cube",
            UVec3::splat(16),
            Mat4::IDENTITY,
        ));
        scene
    }

    #[test]
    fn test_center_pixel_hits_cube() {
        let scene = test_scene();
        let view = scene.view();
        let bvh = Bvh::build(&view);
        let camera = Camera::new(Vec3::new(8.0, 8.0, 50.0), Vec3::splat(8.0), 1.0);
        let config = RenderConfig::new(64, 64);
        let image = render(&camera, &view, &bvh, &config);
        // Palette index 255 in the default grayscale palette is white.
        let center = image.get(32, 32);
        assert!((center - Vec3::ONE).length() < 1e-3);
    }

    #[test]
    fn test_corner_pixel_sees_sky() {
        let scene = test_scene();
        let view = scene.view();
        let bvh = Bvh::build(&view);
        let camera = Camera::new(Vec3::new(8.0, 8.0, 50.0), Vec3::splat(8.0), 1.0);
        let config = RenderConfig::new(64, 64);
        let image = render(&camera, &view, &bvh, &config);
        let corner = image.get(0, 0);
        // Sky gradient blends white toward blue; blue stays at 1.0.
        assert!(corner.z > corner.x);
        assert!((corner.z - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_scene_is_all_sky() {
        let scene = Scene::new("empty");
        let view = scene.view();
        let bvh = Bvh::build(&view);
        let camera = Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 1.0);
        let config = RenderConfig::new(16, 16);
        let image = render(&camera, &view, &bvh, &config);
        for y in 0..16 {
            for x in 0..16 {
                let c = image.get(x, y);
                assert!((c.z - 1.0).abs() < 1e-3, "pixel ({x},{y}) = {c:?}");
            }
        }
    }

    #[test]
    fn test_to_rgba_length_and_alpha() {
        let image = ImageBuffer::new(4, 2);
        let bytes = image.to_rgba();
        assert_eq!(bytes.len(), 4 * 2 * 4);
        assert!(bytes.chunks(4).all(|px| px[3] == 255));
    }
}
