use crate::Ray;
use glam::{Mat4, Vec3, Vec4};

/// Camera for 3D rendering.
///
/// The raymarch passes derive per-pixel rays from the inverse
/// view-projection matrix, so that matrix (and the frustum corner
/// directions derived from it) are first-class here.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.5,
            far: 10000.0,
        }
    }

    /// Get the view matrix (world -> camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix (camera -> clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Inverse view-projection matrix (clip space -> world space)
    pub fn inverse_view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix().inverse()
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// World-space ray through a UV coordinate, (0,0) top-left, (1,1)
    /// bottom-right. Matches the WGSL `calculate_ray_direction` exactly so
    /// the CPU path sees the same picture as the GPU passes.
    pub fn ray_for_uv(&self, uv: glam::Vec2) -> Ray {
        let direction = ray_direction(uv, &self.inverse_view_projection_matrix());
        Ray::new(self.position, direction)
    }

    /// Directions through the four frustum corners, in the order
    /// top-left, top-right, bottom-left, bottom-right. Uploaded as a
    /// uniform for shaders that interpolate instead of unprojecting.
    pub fn frustum_corner_directions(&self) -> [Vec3; 4] {
        let inverse = self.inverse_view_projection_matrix();
        [
            ray_direction(glam::Vec2::new(0.0, 0.0), &inverse),
            ray_direction(glam::Vec2::new(1.0, 0.0), &inverse),
            ray_direction(glam::Vec2::new(0.0, 1.0), &inverse),
            ray_direction(glam::Vec2::new(1.0, 1.0), &inverse),
        ]
    }
}

/// Unproject a UV coordinate through an inverse view-projection matrix
/// into a normalized world-space ray direction.
pub fn ray_direction(uv: glam::Vec2, inverse_view_projection: &Mat4) -> Vec3 {
    let ndc = glam::Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
    let near = *inverse_view_projection * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
    let far = *inverse_view_projection * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
    let near = near.truncate() / near.w;
    let far = far.truncate() / far.w;
    (far - near).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 16.0 / 9.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.aspect, 16.0 / 9.0);
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
        let ray = camera.ray_for_uv(glam::Vec2::splat(0.5));
        assert_eq!(ray.origin, camera.position);
        assert!((ray.direction - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_inverse_view_projection_roundtrip() {
        let camera = Camera::new(Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO, 1.5);
        let vp = camera.view_projection_matrix();
        let inv = camera.inverse_view_projection_matrix();
        let point = Vec3::new(1.0, 2.0, -3.0);
        let clip = vp * point.extend(1.0);
        let back = inv * clip;
        let back = back.truncate() / back.w;
        assert!((back - point).length() < 1e-3);
    }

    #[test]
    fn test_frustum_corners_straddle_center() {
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 1.0);
        let [tl, tr, bl, br] = camera.frustum_corner_directions();
        assert!(tl.x < 0.0 && tl.y > 0.0);
        assert!(tr.x > 0.0 && tr.y > 0.0);
        assert!(bl.x < 0.0 && bl.y < 0.0);
        assert!(br.x > 0.0 && br.y < 0.0);
        for d in [tl, tr, bl, br] {
            assert!(d.z < 0.0);
        }
    }
}
