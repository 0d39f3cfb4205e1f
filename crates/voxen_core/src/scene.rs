use std::sync::Arc;

use glam::UVec3;
use voxen_math::Aabb;

use crate::{VoxelGrid, VoxelObject};

/// Container for everything placed in the world.
///
/// Grids are shared (many objects may instance one grid), objects are
/// owned in a flat vector the BVH indexes into. Passes never touch the
/// scene directly; they borrow an immutable [`SceneView`] for the frame.
#[derive(Debug, Default, Clone)]
pub struct Scene {
    pub name: String,
    grids: Vec<Arc<VoxelGrid>>,
    objects: Vec<VoxelObject>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grids: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Add a grid, returning its index for [`VoxelObject::new`].
    pub fn add_grid(&mut self, grid: VoxelGrid) -> usize {
        self.grids.push(Arc::new(grid));
        self.grids.len() - 1
    }

    pub fn grid(&self, index: usize) -> Option<&Arc<VoxelGrid>> {
        self.grids.get(index)
    }

    pub fn grids(&self) -> &[Arc<VoxelGrid>] {
        &self.grids
    }

    pub fn add_object(&mut self, object: VoxelObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[VoxelObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [VoxelObject] {
        &mut self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Roll every object's motion history; called once per rendered
    /// frame after the object buffer upload.
    pub fn commit_motion(&mut self) {
        for object in &mut self.objects {
            object.commit_motion();
        }
    }

    /// The immutable per-frame borrow handed to the BVH builder and
    /// the render passes.
    pub fn view(&self) -> SceneView<'_> {
        SceneView {
            grids: &self.grids,
            objects: &self.objects,
        }
    }
}

/// Immutable snapshot of a scene for one frame.
#[derive(Debug, Clone, Copy)]
pub struct SceneView<'a> {
    pub grids: &'a [Arc<VoxelGrid>],
    pub objects: &'a [VoxelObject],
}

impl SceneView<'_> {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Union of every object's world AABB; [`Aabb::EMPTY`] for an
    /// empty scene.
    pub fn world_bounds(&self) -> Aabb {
        self.objects
            .iter()
            .fold(Aabb::EMPTY, |bounds, object| {
                Aabb::surrounding(&bounds, &object.world_aabb())
            })
    }

    pub fn grid_for(&self, object: &VoxelObject) -> Option<&Arc<VoxelGrid>> {
        self.grids.get(object.grid_index)
    }
}

/// Demo content: a row of procedural volumes, used by the viewer and
/// the CPU-renderer tests.
pub fn demo_scene(object_count: u32) -> Scene {
    let mut scene = Scene::new("demo");
    let solid = scene.add_grid(VoxelGrid::solid(UVec3::splat(16), 200));
    let checker = scene.add_grid(VoxelGrid::checkerboard(UVec3::splat(16), 128));
    for i in 0..object_count {
        let (grid_index, label) = if i % 2 == 0 {
            (solid, "solid-16")
        } else {
            (checker, "checker-16")
        };
        let offset = glam::Vec3::new(i as f32 * 24.0, 0.0, 0.0);
        scene.add_object(VoxelObject::new(
            grid_index,
            label,
            UVec3::splat(16),
            glam::Mat4::from_translation(offset),
        ));
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_scene_world_bounds() {
        let mut scene = Scene::new("test");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(8), 1));
        scene.add_object(VoxelObject::new(grid, "a", UVec3::splat(8), Mat4::IDENTITY));
        scene.add_object(VoxelObject::new(
            grid,
            "b",
            UVec3::splat(8),
            Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)),
        ));
        let bounds = scene.view().world_bounds();
        assert!((bounds.min - Vec3::ZERO).length() < 1e-4);
        assert!((bounds.max - Vec3::new(108.0, 8.0, 8.0)).length() < 1e-4);
    }

    #[test]
    fn test_empty_scene_view() {
        let scene = Scene::new("empty");
        let view = scene.view();
        assert!(view.is_empty());
        let bounds = view.world_bounds();
        assert!(bounds.min.x > bounds.max.x);
    }

    #[test]
    fn test_demo_scene_population() {
        let scene = demo_scene(5);
        assert_eq!(scene.object_count(), 5);
        assert_eq!(scene.grids().len(), 2);
        for object in scene.objects() {
            assert!(scene.view().grid_for(object).is_some());
        }
    }
}
