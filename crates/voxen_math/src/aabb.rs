use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box, stored as min/max corner points.
///
/// This is the unit the BVH is built from; the min/max representation
/// matches the GPU node record, which stores the two corners directly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB from two corner points (order-insensitive).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Smallest AABB containing every point in the iterator.
    ///
    /// Returns [`Aabb::EMPTY`] for an empty iterator.
    pub fn from_corners(corners: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for corner in corners {
            aabb.min = aabb.min.min(corner);
            aabb.max = aabb.max.max(corner);
        }
        aabb
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns true if `other` fits entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Slab method; returns the entry/exit parameters on a hit so BVH
    /// traversal can visit children near-to-far.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<Interval> {
        let t0 = (self.min - ray.origin) * ray.inv_direction;
        let t1 = (self.max - ray.origin) * ray.inv_direction;
        let t_near = t0.min(t1);
        let t_far = t0.max(t1);

        let entry = t_near.max_element().max(ray_t.min);
        let exit = t_far.min_element().min(ray_t.max);
        if entry <= exit {
            Some(Interval::new(entry, exit))
        } else {
            None
        }
    }

    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 5.0), Vec3::new(0.0, 10.0, 8.0));
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(aabb.max, Vec3::new(10.0, 10.0, 8.0));
    }

    #[test]
    fn test_aabb_surrounding() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let b = Aabb::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let s = Aabb::surrounding(&a, &b);
        assert_eq!(s.min, Vec3::ZERO);
        assert_eq!(s.max, Vec3::splat(10.0));
        assert!(s.contains(&a));
        assert!(s.contains(&b));
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let span = aabb.hit(&ray, Interval::new(0.0, 100.0)).unwrap();
        assert!((span.min - 4.0).abs() < 1e-5);
        assert!((span.max - 6.0).abs() < 1e-5);

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z);
        assert!(aabb.hit(&ray, Interval::new(0.0, 100.0)).is_none());

        // Ray missing the box
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::Z);
        assert!(aabb.hit(&ray, Interval::new(0.0, 100.0)).is_none());
    }

    #[test]
    fn test_aabb_hit_from_inside() {
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let span = aabb.hit(&ray, Interval::new(0.0, 100.0)).unwrap();
        assert_eq!(span.min, 0.0);
        assert!((span.max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(aabb.centroid(), Vec3::splat(5.0));
    }

    #[test]
    fn test_aabb_from_corners_empty() {
        let aabb = Aabb::from_corners(std::iter::empty());
        assert!(aabb.min.x > aabb.max.x);
    }
}
