use crate::Vec3;

/// A ray in 3D space.
///
/// Represents the half-line `origin + t * direction` for t >= 0. The
/// cached reciprocal direction feeds the slab test in [`crate::Aabb::hit`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray. The direction does not need to be normalized,
    /// but the parameter t is only a distance when it is.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Get the point along the ray at parameter t.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Transform the ray by a matrix (origin as a point, direction as a
    /// vector). Used to move a world-space ray into voxel-object space.
    pub fn transformed(&self, matrix: &crate::Mat4) -> Ray {
        Ray::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mat4;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_inv_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(2.0, 4.0, -1.0));
        assert_eq!(ray.inv_direction.x, 0.5);
        assert_eq!(ray.inv_direction.y, 0.25);
        assert_eq!(ray.inv_direction.z, -1.0);
    }

    #[test]
    fn test_ray_transformed() {
        let matrix = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let moved = ray.transformed(&matrix);
        assert_eq!(moved.origin, Vec3::new(10.0, 0.0, 0.0));
        // Translation must not affect the direction
        assert_eq!(moved.direction, Vec3::Z);
    }
}
