//! 3D Morton codes for spatially ordering voxel objects before the BVH
//! median split.

use crate::{Aabb, Vec3};

/// Bits of precision per axis. Three axes interleave into a 30-bit code.
const BITS_PER_AXIS: u32 = 10;
const AXIS_MAX: u32 = (1 << BITS_PER_AXIS) - 1;

/// Spread the low 10 bits of x so there are two zero bits between each.
fn part1by2(x: u32) -> u32 {
    let mut x = x & AXIS_MAX;
    x = (x | (x << 16)) & 0x030000FF;
    x = (x | (x << 8)) & 0x0300F00F;
    x = (x | (x << 4)) & 0x030C30C3;
    x = (x | (x << 2)) & 0x09249249;
    x
}

/// Interleave three 10-bit axis values into a single Morton code.
pub fn morton_encode(x: u32, y: u32, z: u32) -> u32 {
    part1by2(x) | (part1by2(y) << 1) | (part1by2(z) << 2)
}

/// Morton code of a point quantized against a bounding box.
///
/// Points outside `bounds` clamp to the nearest cell; a degenerate axis
/// quantizes to zero on that axis.
pub fn quantized_morton(point: Vec3, bounds: &Aabb) -> u32 {
    let extent = bounds.max - bounds.min;
    let quantize = |v: f32, min: f32, size: f32| -> u32 {
        if size <= 0.0 {
            return 0;
        }
        let normalized = ((v - min) / size).clamp(0.0, 1.0);
        (normalized * AXIS_MAX as f32) as u32
    };
    morton_encode(
        quantize(point.x, bounds.min.x, extent.x),
        quantize(point.y, bounds.min.y, extent.y),
        quantize(point.z, bounds.min.z, extent.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part1by2_spreads_bits() {
        assert_eq!(part1by2(0b111), 0b1001001);
        assert_eq!(part1by2(0), 0);
    }

    #[test]
    fn test_morton_interleave() {
        // x occupies bit 0, y bit 1, z bit 2 of each triple
        assert_eq!(morton_encode(1, 0, 0), 0b001);
        assert_eq!(morton_encode(0, 1, 0), 0b010);
        assert_eq!(morton_encode(0, 0, 1), 0b100);
        assert_eq!(morton_encode(1, 1, 1), 0b111);
    }

    #[test]
    fn test_morton_orders_along_axis() {
        let bounds = Aabb::from_points(Vec3::ZERO, Vec3::splat(100.0));
        let near = quantized_morton(Vec3::new(1.0, 0.0, 0.0), &bounds);
        let far = quantized_morton(Vec3::new(99.0, 0.0, 0.0), &bounds);
        assert!(near < far);
    }

    #[test]
    fn test_morton_clamps_outside_points() {
        let bounds = Aabb::from_points(Vec3::ZERO, Vec3::splat(10.0));
        let inside = quantized_morton(Vec3::splat(10.0), &bounds);
        let outside = quantized_morton(Vec3::splat(50.0), &bounds);
        assert_eq!(inside, outside);
    }

    #[test]
    fn test_morton_degenerate_bounds() {
        let bounds = Aabb::from_points(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(quantized_morton(Vec3::splat(5.0), &bounds), 0);
    }
}
