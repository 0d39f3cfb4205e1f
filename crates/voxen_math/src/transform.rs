// Transform utilities for Mat4
//
// Extends glam::Mat4 with convenience methods for raymarching transforms.
// Note: glam::Mat4 already provides transform_point3() and inverse()

use crate::Aabb;
use glam::{Mat4, Vec3, Vec4};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a vector in 3D space (applies rotation and scale, but NOT
    /// translation). Vectors have an implicit w=0 component.
    fn transform_vector3(&self, vector: Vec3) -> Vec3;

    /// Transform an axis-aligned bounding box by transforming all 8 corners
    /// and taking their bounds.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_vector3(&self, vector: Vec3) -> Vec3 {
        let v4 = *self * Vec4::new(vector.x, vector.y, vector.z, 0.0);
        Vec3::new(v4.x, v4.y, v4.z)
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let (min, max) = (aabb.min, aabb.max);
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        Aabb::from_corners(corners.iter().map(|&c| self.transform_point3(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_vector3_no_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let vector = Vec3::X;
        // Translation should NOT affect vectors (w=0)
        assert_eq!(mat.transform_vector3(vector), vector);
    }

    #[test]
    fn test_transform_vector3_rotation() {
        use std::f32::consts::PI;
        let mat = Mat4::from_rotation_z(PI / 2.0);
        let rotated = mat.transform_vector3(Vec3::X);
        assert!((rotated - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::splat(5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let moved = mat.transform_aabb(&aabb);
        assert!((moved.min - Vec3::splat(5.0)).length() < 1e-5);
        assert!((moved.max - Vec3::splat(6.0)).length() < 1e-5);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_bounds() {
        use std::f32::consts::PI;
        // 45 degrees around Y: a unit cube's footprint widens to sqrt(2)
        let mat = Mat4::from_rotation_y(PI / 4.0);
        let aabb = Aabb::from_points(Vec3::splat(-0.5), Vec3::splat(0.5));
        let rotated = mat.transform_aabb(&aabb);
        let width = rotated.max.x - rotated.min.x;
        assert!((width - std::f32::consts::SQRT_2).abs() < 1e-4);
    }
}
