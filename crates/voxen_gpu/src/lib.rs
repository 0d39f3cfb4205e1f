//! Deferred sparse-voxel render pipeline on wgpu.
//!
//! Per frame, one command encoder runs: worklist clears, the sparse
//! raymarch (one ray per 3x3 pixel tile), G-buffer history copies, the
//! interpolation/densify pass, a tiny dispatch-sizing pass, the
//! indirect buffer march over deferred pixels, and world-position
//! reconstruction. The G-buffer textures it fills are the hand-off
//! point for lighting and post passes.

pub mod atlas;
pub mod context;
pub mod frame;
pub mod gbuffer;
pub mod passes;
pub mod timing;
pub mod uniforms;
pub mod worklist;

pub use atlas::{AtlasError, AtlasLayout, VolumeAtlas, VolumeSlot};
pub use context::RenderContext;
pub use frame::FrameGraph;
pub use gbuffer::GBuffer;
pub use timing::FrameTimer;
pub use uniforms::{FrameUniforms, SceneBuffers};
pub use worklist::{max_screen_rays, ScreenRayWorklist, MARCH_WORKGROUP_SIZE, TILE_SIZE};
