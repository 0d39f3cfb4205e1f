//! Bounding volume hierarchy over the scene's voxel objects.
//!
//! Built top-down: objects are sorted by the Morton code of their
//! world-space AABB centroid, then recursively split at the median.
//! The result is a flat arena of nodes with explicit child indices,
//! root at index 0, serialized into a fixed-stride GPU buffer that the
//! raymarch shaders traverse with an explicit stack.

use glam::Vec3;
use voxen_math::{quantized_morton, Aabb, Interval, Ray};

use crate::SceneView;

/// Byte stride of one serialized node in the GPU buffer.
pub const BVH_NODE_STRIDE: usize = 48;

/// One node of the flat BVH arena.
///
/// Internal nodes hold two child indices into the arena. A leaf stores
/// the voxel-object index in `left_child`, `right_child = -1`, and an
/// `object_count` of 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub aabb: Aabb,
    pub left_child: i32,
    pub right_child: i32,
    pub object_count: u32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.right_child < 0
    }

    /// Voxel-object index for a leaf node.
    pub fn object_index(&self) -> usize {
        debug_assert!(self.is_leaf());
        self.left_child as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
}

struct LeafSeed {
    object_index: usize,
    aabb: Aabb,
    center: Vec3,
}

impl Bvh {
    /// Build the hierarchy for a scene view. Pure function over the
    /// objects' world AABBs; an empty view yields an empty tree, which
    /// callers must guard before dispatching traversal work.
    pub fn build(view: &SceneView) -> Bvh {
        let mut leaves: Vec<LeafSeed> = view
            .objects
            .iter()
            .enumerate()
            .map(|(object_index, object)| {
                let aabb = object.world_aabb();
                LeafSeed {
                    object_index,
                    aabb,
                    center: aabb.centroid(),
                }
            })
            .collect();
        if leaves.is_empty() {
            return Bvh::default();
        }

        let bounds = leaves
            .iter()
            .fold(Aabb::EMPTY, |b, leaf| {
                Aabb::surrounding(&b, &Aabb::from_points(leaf.center, leaf.center))
            });
        // Stable sort keeps the build deterministic when codes collide.
        leaves.sort_by_key(|leaf| quantized_morton(leaf.center, &bounds));

        let mut bvh = Bvh {
            nodes: Vec::with_capacity(leaves.len() * 2 - 1),
        };
        bvh.build_range(&leaves);
        bvh
    }

    /// Recursively emit the subtree for a slice of Morton-sorted
    /// leaves, returning its arena index.
    fn build_range(&mut self, leaves: &[LeafSeed]) -> i32 {
        if let [leaf] = leaves {
            self.nodes.push(BvhNode {
                aabb: leaf.aabb,
                left_child: leaf.object_index as i32,
                right_child: -1,
                object_count: 1,
            });
            return self.nodes.len() as i32 - 1;
        }

        // Reserve the parent slot before its children so the root lands
        // at index 0 and parents always precede their subtrees.
        let node_index = self.nodes.len();
        self.nodes.push(BvhNode {
            aabb: Aabb::EMPTY,
            left_child: -1,
            right_child: -1,
            object_count: leaves.len() as u32,
        });

        let mid = leaves.len() / 2;
        let left = self.build_range(&leaves[..mid]);
        let right = self.build_range(&leaves[mid..]);
        let aabb = Aabb::surrounding(
            &self.nodes[left as usize].aabb,
            &self.nodes[right as usize].aabb,
        );
        let node = &mut self.nodes[node_index];
        node.aabb = aabb;
        node.left_child = left;
        node.right_child = right;
        node_index as i32
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Serialize into the GPU layout: per node, child indices as two
    /// little-endian i32 at offsets 0 and 4, AABB min as three f32 at
    /// 16, max at 32, object count as u32 at 44. Stride 48.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.nodes.len() * BVH_NODE_STRIDE];
        for (i, node) in self.nodes.iter().enumerate() {
            let record = &mut bytes[i * BVH_NODE_STRIDE..(i + 1) * BVH_NODE_STRIDE];
            record[0..4].copy_from_slice(&node.left_child.to_le_bytes());
            record[4..8].copy_from_slice(&node.right_child.to_le_bytes());
            write_vec3(&mut record[16..28], node.aabb.min);
            write_vec3(&mut record[32..44], node.aabb.max);
            record[44..48].copy_from_slice(&node.object_count.to_le_bytes());
        }
        bytes
    }

    /// Traverse near-to-far against a ray, handing each intersected
    /// leaf to `hit_leaf` along with the ray's span through its AABB.
    /// The visitor returns `Some(t)` on a hit; traversal keeps the
    /// nearest and prunes nodes whose entry lies beyond it.
    pub fn intersect<F>(&self, ray: &Ray, ray_t: Interval, mut hit_leaf: F) -> Option<(usize, f32)>
    where
        F: FnMut(usize, Interval) -> Option<f32>,
    {
        if self.nodes.is_empty() {
            return None;
        }
        let mut closest: Option<(usize, f32)> = None;
        let mut stack: Vec<i32> = vec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            let limit = closest.map_or(ray_t.max, |(_, t)| t);
            let span = match node.aabb.hit(ray, Interval::new(ray_t.min, limit)) {
                Some(span) => span,
                None => continue,
            };
            if node.is_leaf() {
                if let Some(t) = hit_leaf(node.object_index(), span) {
                    if closest.map_or(true, |(_, best)| t < best) {
                        closest = Some((node.object_index(), t));
                    }
                }
                continue;
            }
            // Push the farther child first so the nearer pops first.
            let children = order_by_entry(self, ray, ray_t, node.left_child, node.right_child);
            stack.push(children.1);
            stack.push(children.0);
        }
        closest
    }
}

fn order_by_entry(bvh: &Bvh, ray: &Ray, ray_t: Interval, left: i32, right: i32) -> (i32, i32) {
    let entry = |index: i32| {
        bvh.nodes[index as usize]
            .aabb
            .hit(ray, ray_t)
            .map_or(f32::INFINITY, |span| span.min)
    };
    if entry(left) <= entry(right) {
        (left, right)
    } else {
        (right, left)
    }
}

fn write_vec3(out: &mut [u8], v: Vec3) {
    out[0..4].copy_from_slice(&v.x.to_le_bytes());
    out[4..8].copy_from_slice(&v.y.to_le_bytes());
    out[8..12].copy_from_slice(&v.z.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Scene, VoxelGrid, VoxelObject};
    use glam::{Mat4, UVec3};

    fn scene_with_objects(translations: &[Vec3]) -> Scene {
        let mut scene = Scene::new("bvh-test");
        let grid = scene.add_grid(VoxelGrid::solid(UVec3::splat(8), 1));
        for (i, &t) in translations.iter().enumerate() {
            scene.add_object(VoxelObject::new(
                grid,
                format!("v{i}"),
                UVec3::splat(8),
                Mat4::from_translation(t),
            ));
        }
        scene
    }

    #[test]
    fn test_empty_scene_builds_empty_tree() {
        let scene = Scene::new("empty");
        let bvh = Bvh::build(&scene.view());
        assert!(bvh.is_empty());
        assert!(bvh.to_bytes().is_empty());
    }

    #[test]
    fn test_single_object_is_one_leaf() {
        let scene = scene_with_objects(&[Vec3::ZERO]);
        let bvh = Bvh::build(&scene.view());
        assert_eq!(bvh.node_count(), 1);
        let root = bvh.nodes()[0];
        assert!(root.is_leaf());
        assert_eq!(root.object_index(), 0);
        assert_eq!(root.object_count, 1);
    }

    #[test]
    fn test_node_counts_for_n_objects() {
        for n in 2..=16usize {
            let translations: Vec<Vec3> = (0..n)
                .map(|i| Vec3::new(i as f32 * 20.0, 0.0, 0.0))
                .collect();
            let scene = scene_with_objects(&translations);
            let bvh = Bvh::build(&scene.view());
            assert_eq!(bvh.node_count(), 2 * n - 1, "n = {n}");
            assert_eq!(bvh.leaf_count(), n, "n = {n}");
        }
    }

    #[test]
    fn test_parent_contains_children() {
        let translations: Vec<Vec3> = (0..9)
            .map(|i| Vec3::new((i % 3) as f32 * 30.0, (i / 3) as f32 * 30.0, 0.0))
            .collect();
        let scene = scene_with_objects(&translations);
        let bvh = Bvh::build(&scene.view());
        for node in bvh.nodes() {
            if node.is_leaf() {
                continue;
            }
            let left = &bvh.nodes()[node.left_child as usize];
            let right = &bvh.nodes()[node.right_child as usize];
            assert!(node.aabb.contains(&left.aabb));
            assert!(node.aabb.contains(&right.aabb));
            assert_eq!(node.object_count, left.object_count + right.object_count);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let translations: Vec<Vec3> = (0..7)
            .map(|i| Vec3::new(i as f32 * 11.0, (i as f32 * 7.0) % 31.0, i as f32))
            .collect();
        let scene = scene_with_objects(&translations);
        let a = Bvh::build(&scene.view());
        let b = Bvh::build(&scene.view());
        assert_eq!(a.nodes(), b.nodes());
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_every_object_reachable_from_root() {
        let translations: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    (i & 1) as f32 * 50.0,
                    ((i >> 1) & 1) as f32 * 50.0,
                    ((i >> 2) & 1) as f32 * 50.0,
                )
            })
            .collect();
        let scene = scene_with_objects(&translations);
        let bvh = Bvh::build(&scene.view());

        let mut seen = vec![0usize; 8];
        let mut stack = vec![0i32];
        while let Some(index) = stack.pop() {
            let node = &bvh.nodes()[index as usize];
            if node.is_leaf() {
                seen[node.object_index()] += 1;
            } else {
                stack.push(node.left_child);
                stack.push(node.right_child);
            }
        }
        assert_eq!(seen, vec![1; 8]);
    }

    #[test]
    fn test_two_object_scenario() {
        let scene = scene_with_objects(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)]);
        let bvh = Bvh::build(&scene.view());
        assert_eq!(bvh.node_count(), 3);

        let root = bvh.nodes()[0];
        assert!(!root.is_leaf());
        assert!((root.aabb.min - Vec3::ZERO).length() < 1e-4);
        assert!((root.aabb.max - Vec3::new(108.0, 8.0, 8.0)).length() < 1e-4);

        let left = bvh.nodes()[root.left_child as usize];
        let right = bvh.nodes()[root.right_child as usize];
        assert!(left.is_leaf() && right.is_leaf());
        assert!((left.aabb.max - Vec3::splat(8.0)).length() < 1e-4);
        assert!((right.aabb.min - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-4);
        assert!((right.aabb.max - Vec3::new(108.0, 8.0, 8.0)).length() < 1e-4);
    }

    #[test]
    fn test_serialized_layout() {
        let scene = scene_with_objects(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)]);
        let bvh = Bvh::build(&scene.view());
        let bytes = bvh.to_bytes();
        assert_eq!(bytes.len(), 3 * BVH_NODE_STRIDE);

        let root = bvh.nodes()[0];
        let left = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let right = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(left, root.left_child);
        assert_eq!(right, root.right_child);
        let min_x = f32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let max_x = f32::from_le_bytes(bytes[32..36].try_into().unwrap());
        assert_eq!(min_x, root.aabb.min.x);
        assert_eq!(max_x, root.aabb.max.x);
        let count = u32::from_le_bytes(bytes[44..48].try_into().unwrap());
        assert_eq!(count, 2);

        // Leaf record: object index in the left-child slot, -1 right.
        let leaf = &bytes[BVH_NODE_STRIDE..2 * BVH_NODE_STRIDE];
        let leaf_right = i32::from_le_bytes(leaf[4..8].try_into().unwrap());
        assert_eq!(leaf_right, -1);
        let leaf_count = u32::from_le_bytes(leaf[44..48].try_into().unwrap());
        assert_eq!(leaf_count, 1);
    }

    #[test]
    fn test_intersect_finds_nearest_leaf() {
        let scene = scene_with_objects(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)]);
        let bvh = Bvh::build(&scene.view());
        // Ray down +x through both boxes; treating leaf AABBs as solid,
        // the nearer object must win.
        let ray = Ray::new(Vec3::new(-10.0, 4.0, 4.0), Vec3::X);
        let hit = bvh.intersect(&ray, Interval::new(0.0, 1e4), |_, span| Some(span.min));
        let (object, t) = hit.unwrap();
        assert_eq!(object, 0);
        assert!((t - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_intersect_miss() {
        let scene = scene_with_objects(&[Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)]);
        let bvh = Bvh::build(&scene.view());
        let ray = Ray::new(Vec3::new(-10.0, 50.0, 4.0), Vec3::X);
        let hit = bvh.intersect(&ray, Interval::new(0.0, 1e4), |_, span| Some(span.min));
        assert!(hit.is_none());
    }
}
