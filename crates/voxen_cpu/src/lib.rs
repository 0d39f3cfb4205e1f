//! CPU reference raymarcher.
//!
//! Marches the same BVH and voxel grids as the GPU pipeline, on a
//! rayon bucket pool, producing an albedo image. Exists for
//! ground-truth comparison against the GPU output and as the march
//! logic the unit tests exercise without a device.

pub mod bucket;
pub mod raymarch;
pub mod renderer;

pub use bucket::{generate_buckets, Bucket, DEFAULT_BUCKET_SIZE};
pub use raymarch::{march_object, march_scene, VoxelHit};
pub use renderer::{render, sky_color, Color, ImageBuffer, RenderConfig};
