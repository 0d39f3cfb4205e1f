//! Voxel grid traversal (3D DDA).
//!
//! A world-space ray is moved into object space with the object's
//! cached inverse transform; because the direction is not renormalized
//! there, the ray parameter t means the same thing in both spaces, so
//! hits from different objects compare directly.

use glam::Vec3;
use voxen_core::{Bvh, SceneView, VoxelGrid, VoxelObject};
use voxen_math::{Aabb, Interval, Ray};

/// A resolved voxel intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelHit {
    /// Ray parameter of the entry face.
    pub t: f32,
    pub palette_index: u8,
    /// Face normal in object space (axis-aligned unit vector).
    pub normal: Vec3,
}

/// March a single object's grid. `span` is the world ray's interval
/// through the object's world AABB, as reported by BVH traversal.
pub fn march_object(
    ray: &Ray,
    object: &VoxelObject,
    grid: &VoxelGrid,
    span: Interval,
) -> Option<VoxelHit> {
    let local = ray.transformed(object.inverse_transform());
    let bounds = Aabb::from_points(Vec3::ZERO, object.size.as_vec3());
    // Re-clip in object space; the world span came from a conservative
    // world AABB and may be wider under rotation.
    let span = bounds.hit(&local, span)?;

    let size = object.size.as_vec3();
    let entry_t = span.min.max(0.0);
    let start = local.at(entry_t);

    // Cell coordinates, clamped so a point on a max face starts inside.
    let mut cell = start.floor().clamp(Vec3::ZERO, size - 1.0);
    let step = local.direction.signum();
    // Parameter advance per axis for one cell, and parameter of the
    // next boundary crossing on each axis.
    let t_delta = local.inv_direction.abs();
    let mut t_max = Vec3::new(
        axis_boundary(start.x, cell.x, step.x, local.inv_direction.x, entry_t),
        axis_boundary(start.y, cell.y, step.y, local.inv_direction.y, entry_t),
        axis_boundary(start.z, cell.z, step.z, local.inv_direction.z, entry_t),
    );

    let mut t = entry_t;
    let mut normal = entry_normal(&local, &bounds);
    loop {
        if cell.min_element() < 0.0 || cell.cmpge(size).any() {
            return None;
        }
        let index = grid.get(cell.x as u32, cell.y as u32, cell.z as u32);
        if index != 0 {
            return Some(VoxelHit {
                t,
                palette_index: index,
                normal,
            });
        }
        // Step along whichever axis crosses its boundary first.
        if t_max.x <= t_max.y && t_max.x <= t_max.z {
            t = t_max.x;
            cell.x += step.x;
            t_max.x += t_delta.x;
            normal = Vec3::new(-step.x, 0.0, 0.0);
        } else if t_max.y <= t_max.z {
            t = t_max.y;
            cell.y += step.y;
            t_max.y += t_delta.y;
            normal = Vec3::new(0.0, -step.y, 0.0);
        } else {
            t = t_max.z;
            cell.z += step.z;
            t_max.z += t_delta.z;
            normal = Vec3::new(0.0, 0.0, -step.z);
        }
        if t > span.max {
            return None;
        }
    }
}

/// Parameter of the first boundary crossing on one axis.
fn axis_boundary(start: f32, cell: f32, step: f32, inv_dir: f32, entry_t: f32) -> f32 {
    if step == 0.0 || !inv_dir.is_finite() {
        return f32::INFINITY;
    }
    let next = if step > 0.0 { cell + 1.0 } else { cell };
    entry_t + (next - start) * inv_dir
}

/// Outward normal of the AABB face the ray entered through: the slab
/// axis with the latest entry parameter, facing back along the ray.
fn entry_normal(local: &Ray, bounds: &Aabb) -> Vec3 {
    let t0 = (bounds.min - local.origin) * local.inv_direction;
    let t1 = (bounds.max - local.origin) * local.inv_direction;
    let t_near = t0.min(t1);
    if t_near.x >= t_near.y && t_near.x >= t_near.z {
        Vec3::new(-local.direction.x.signum(), 0.0, 0.0)
    } else if t_near.y >= t_near.z {
        Vec3::new(0.0, -local.direction.y.signum(), 0.0)
    } else {
        Vec3::new(0.0, 0.0, -local.direction.z.signum())
    }
}

/// March a full scene: BVH traversal picks candidate leaves near to
/// far, each leaf's grid is DDA-marched, the nearest voxel hit wins.
pub fn march_scene(ray: &Ray, view: &SceneView, bvh: &Bvh) -> Option<(usize, VoxelHit)> {
    let mut best: Option<(usize, VoxelHit)> = None;
    bvh.intersect(ray, Interval::new(0.0, f32::INFINITY), |object_index, span| {
        let object = &view.objects[object_index];
        let grid = view.grid_for(object)?;
        let hit = march_object(ray, object, grid, span)?;
        if best.as_ref().map_or(true, |(_, b)| hit.t < b.t) {
            best = Some((object_index, hit));
        }
        Some(hit.t)
    });
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, UVec3};
    use voxen_core::Scene;

    fn solid_object_scene() -> Scene {
        let mut scene = Scene::new("march-test");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(8), 42));
        scene.add_object(voxen_core::VoxelObject::new(
            grid,
            "solid",
            UVec3::splat(8),
            Mat4::IDENTITY,
        ));
        scene
    }

    #[test]
    fn test_march_hits_front_face() {
        let scene = solid_object_scene();
        let view = scene.view();
        let object = &view.objects[0];
        let grid = view.grid_for(object).unwrap();
        let ray = Ray::new(Vec3::new(4.0, 4.0, -10.0), Vec3::Z);
        let hit = march_object(&ray, object, grid, Interval::new(0.0, 100.0)).unwrap();
        assert!((hit.t - 10.0).abs() < 1e-3);
        assert_eq!(hit.palette_index, 42);
        assert_eq!(hit.normal, Vec3::NEG_Z);
    }

    #[test]
    fn test_march_misses_beside_grid() {
        let scene = solid_object_scene();
        let view = scene.view();
        let object = &view.objects[0];
        let grid = view.grid_for(object).unwrap();
        let ray = Ray::new(Vec3::new(20.0, 4.0, -10.0), Vec3::Z);
        assert!(march_object(&ray, object, grid, Interval::new(0.0, 100.0)).is_none());
    }

    #[test]
    fn test_march_skips_empty_voxels() {
        let mut scene = Scene::new("checker");
        let grid = scene.add_grid(VoxelGrid::checkerboard(UVec3::splat(8), 9));
        scene.add_object(voxen_core::VoxelObject::new(
            grid,
            "checker",
            UVec3::splat(8),
            Mat4::IDENTITY,
        ));
        let view = scene.view();
        let object = &view.objects[0];
        let grid = view.grid_for(object).unwrap();
        // Aim down the +x row at y=0, z=1: (0,0,1) is empty, (1,0,1)
        // is filled, so the march must pass through one empty cell.
        let ray = Ray::new(Vec3::new(-5.0, 0.5, 1.5), Vec3::X);
        let hit = march_object(&ray, object, grid, Interval::new(0.0, 100.0)).unwrap();
        assert_eq!(hit.palette_index, 9);
        assert!((hit.t - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_march_respects_transform() {
        let mut scene = Scene::new("moved");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(8), 7));
        scene.add_object(voxen_core::VoxelObject::new(
            grid,
            "moved",
            UVec3::splat(8),
            Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)),
        ));
        let view = scene.view();
        let object = &view.objects[0];
        let grid = view.grid_for(object).unwrap();
        let ray = Ray::new(Vec3::new(104.0, 4.0, -10.0), Vec3::Z);
        let hit = march_object(&ray, object, grid, Interval::new(0.0, 200.0)).unwrap();
        assert!((hit.t - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_march_scene_nearest_object_wins() {
        let mut scene = Scene::new("two");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(8), 3));
        for x in [0.0f32, 100.0] {
            scene.add_object(voxen_core::VoxelObject::new(
                grid,
                format!("o{x}"),
                UVec3::splat(8),
                Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            ));
        }
        let view = scene.view();
        let bvh = Bvh::build(&view);
        let ray = Ray::new(Vec3::new(-10.0, 4.0, 4.0), Vec3::X);
        let (object_index, hit) = march_scene(&ray, &view, &bvh).unwrap();
        assert_eq!(object_index, 0);
        assert!((hit.t - 10.0).abs() < 1e-3);
    }
}
