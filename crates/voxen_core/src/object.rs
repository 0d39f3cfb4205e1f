use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec3, Vec3};
use voxen_math::{Aabb, Mat4Ext};

/// Byte stride of one [`VoxelObjectRecord`] in the GPU object buffer.
pub const VOXEL_OBJECT_STRIDE: usize = std::mem::size_of::<VoxelObjectRecord>();

/// A voxel grid placed in the world.
///
/// The transform maps object space (voxel units, origin at the grid's
/// minimum corner) to world space. The inverse is cached and only ever
/// recomputed by [`VoxelObject::set_transform`], so the two can never
/// drift apart. Previous-frame copies of both feed the velocity channel.
#[derive(Debug, Clone)]
pub struct VoxelObject {
    transform: Mat4,
    inverse_transform: Mat4,
    previous_transform: Mat4,
    previous_inverse_transform: Mat4,
    pub size: UVec3,
    pub atlas_location: UVec3,
    pub palette_index: u32,
    pub brick_offset: u32,
    /// Index of this object's [`crate::VoxelGrid`] in the owning scene.
    pub grid_index: usize,
    /// Label of the atlas volume this object samples.
    pub volume_label: String,
}

impl VoxelObject {
    pub fn new(grid_index: usize, volume_label: impl Into<String>, size: UVec3, transform: Mat4) -> Self {
        let inverse = transform.inverse();
        Self {
            transform,
            inverse_transform: inverse,
            previous_transform: transform,
            previous_inverse_transform: inverse,
            size,
            atlas_location: UVec3::ZERO,
            palette_index: 0,
            brick_offset: 0,
            grid_index,
            volume_label: volume_label.into(),
        }
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn inverse_transform(&self) -> &Mat4 {
        &self.inverse_transform
    }

    /// Replace the object→world transform, recomputing the cached
    /// inverse. The previous-frame matrices are untouched; call
    /// [`VoxelObject::commit_motion`] once per frame to roll them.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.inverse_transform = transform.inverse();
    }

    /// Roll the current matrices into the previous-frame slots. Called
    /// after a frame's object buffer upload so the next frame sees this
    /// frame's pose as history.
    pub fn commit_motion(&mut self) {
        self.previous_transform = self.transform;
        self.previous_inverse_transform = self.inverse_transform;
    }

    /// World-space AABB: the transformed corners of the object-space
    /// box `[0, size]`.
    pub fn world_aabb(&self) -> Aabb {
        let local = Aabb::from_points(Vec3::ZERO, self.size.as_vec3());
        self.transform.transform_aabb(&local)
    }

    pub fn world_center(&self) -> Vec3 {
        self.world_aabb().centroid()
    }

    /// Pack this object into its GPU record.
    pub fn to_record(&self) -> VoxelObjectRecord {
        VoxelObjectRecord {
            transform: self.transform.to_cols_array_2d(),
            inverse_transform: self.inverse_transform.to_cols_array_2d(),
            previous_transform: self.previous_transform.to_cols_array_2d(),
            previous_inverse_transform: self.previous_inverse_transform.to_cols_array_2d(),
            size: self.size.as_vec3().to_array(),
            _pad0: 0.0,
            atlas_location: self.atlas_location.as_vec3().to_array(),
            palette_index: self.palette_index as f32,
            brick_offset: self.brick_offset,
            _pad1: [0; 3],
        }
    }
}

/// GPU-side object record, 304 bytes: four mat4x4f, then size,
/// atlas location + palette index, and the brick-map word offset,
/// each row padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VoxelObjectRecord {
    pub transform: [[f32; 4]; 4],
    pub inverse_transform: [[f32; 4]; 4],
    pub previous_transform: [[f32; 4]; 4],
    pub previous_inverse_transform: [[f32; 4]; 4],
    pub size: [f32; 3],
    pub _pad0: f32,
    pub atlas_location: [f32; 3],
    pub palette_index: f32,
    pub brick_offset: u32,
    pub _pad1: [u32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_stride() {
        assert_eq!(VOXEL_OBJECT_STRIDE, 304);
    }

    #[test]
    fn test_inverse_tracks_transform() {
        let mut object = VoxelObject::new(0, "a", UVec3::splat(8), Mat4::IDENTITY);
        object.set_transform(Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)));
        let round_trip = *object.transform() * *object.inverse_transform();
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_commit_motion_rolls_previous() {
        let mut object = VoxelObject::new(0, "a", UVec3::splat(8), Mat4::IDENTITY);
        object.set_transform(Mat4::from_translation(Vec3::X));
        let record = object.to_record();
        assert_eq!(record.previous_transform, Mat4::IDENTITY.to_cols_array_2d());
        object.commit_motion();
        let record = object.to_record();
        assert_eq!(record.previous_transform, record.transform);
    }

    #[test]
    fn test_world_aabb_translation() {
        let transform = Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0));
        let object = VoxelObject::new(0, "a", UVec3::splat(8), transform);
        let aabb = object.world_aabb();
        assert!((aabb.min - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-4);
        assert!((aabb.max - Vec3::new(108.0, 8.0, 8.0)).length() < 1e-4);
    }
}
