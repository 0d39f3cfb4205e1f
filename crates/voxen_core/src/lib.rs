//! Scene data model for the voxel renderer.
//!
//! Owns the CPU-side picture of the world: voxel grids, placed voxel
//! objects, the scene container, the BVH spatial index and its GPU
//! serialization, and the renderer settings. Everything here is plain
//! data with no GPU handles, so the whole crate is unit-testable
//! without a device.

pub mod bvh;
pub mod grid;
pub mod object;
pub mod scene;
pub mod settings;

pub use bvh::{Bvh, BvhNode, BVH_NODE_STRIDE};
pub use grid::{default_palette, GridError, VoxelGrid, BRICK_SIZE};
pub use object::{VoxelObject, VoxelObjectRecord, VOXEL_OBJECT_STRIDE};
pub use scene::{demo_scene, Scene, SceneView};
pub use settings::{DeferralConfig, RenderSettings, SettingsError};
