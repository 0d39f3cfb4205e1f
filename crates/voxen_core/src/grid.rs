use glam::UVec3;
use thiserror::Error;

/// Edge length of one occupancy brick, in voxels.
pub const BRICK_SIZE: u32 = 4;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("voxel data length {actual} does not match size {size:?} ({expected} voxels)")]
    SizeMismatch {
        size: UVec3,
        expected: usize,
        actual: usize,
    },
    #[error("voxel grid size must be non-zero on every axis, got {0:?}")]
    ZeroExtent(UVec3),
}

/// CPU-side voxel payload: a dense grid of palette indices plus the
/// palette itself.
///
/// Index 0 means empty; indices 1..=255 look up an RGBA color in the
/// palette. Voxels are stored x-fastest (x + y*sx + z*sx*sy), the same
/// order the atlas upload and the brick map use.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    pub size: UVec3,
    voxels: Vec<u8>,
    pub palette: [[u8; 4]; 256],
}

impl VoxelGrid {
    pub fn new(size: UVec3, voxels: Vec<u8>, palette: [[u8; 4]; 256]) -> Result<Self, GridError> {
        if size.x == 0 || size.y == 0 || size.z == 0 {
            return Err(GridError::ZeroExtent(size));
        }
        let expected = (size.x * size.y * size.z) as usize;
        if voxels.len() != expected {
            return Err(GridError::SizeMismatch {
                size,
                expected,
                actual: voxels.len(),
            });
        }
        Ok(Self {
            size,
            voxels,
            palette,
        })
    }

    /// A fully filled grid using a single palette index.
    pub fn solid(size: UVec3, palette_index: u8) -> Self {
        let count = (size.x * size.y * size.z) as usize;
        Self {
            size,
            voxels: vec![palette_index; count],
            palette: default_palette(),
        }
    }

    /// Alternating filled/empty voxels in a 3D checker pattern. Handy
    /// procedural content for tests and the demo scene.
    pub fn checkerboard(size: UVec3, filled: u8) -> Self {
        let mut voxels = Vec::with_capacity((size.x * size.y * size.z) as usize);
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let on = (x + y + z) % 2 == 0;
                    voxels.push(if on { filled } else { 0 });
                }
            }
        }
        Self {
            size,
            voxels,
            palette: default_palette(),
        }
    }

    /// Palette index at a voxel coordinate; 0 is empty. Out-of-bounds
    /// coordinates read as empty.
    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        if x >= self.size.x || y >= self.size.y || z >= self.size.z {
            return 0;
        }
        let index = (x + y * self.size.x + z * self.size.x * self.size.y) as usize;
        self.voxels[index]
    }

    pub fn voxels(&self) -> &[u8] {
        &self.voxels
    }

    /// RGBA color for a voxel's palette index, linearized to f32.
    pub fn color(&self, palette_index: u8) -> [f32; 4] {
        let c = self.palette[palette_index as usize];
        [
            c[0] as f32 / 255.0,
            c[1] as f32 / 255.0,
            c[2] as f32 / 255.0,
            c[3] as f32 / 255.0,
        ]
    }

    /// Grid extent measured in bricks, rounding partial bricks up.
    pub fn brick_dims(&self) -> UVec3 {
        UVec3::new(
            self.size.x.div_ceil(BRICK_SIZE),
            self.size.y.div_ceil(BRICK_SIZE),
            self.size.z.div_ceil(BRICK_SIZE),
        )
    }

    /// Occupancy bitmask with one bit per 4x4x4 brick, packed LSB-first
    /// into u32 words in brick x-fastest order. A set bit means the
    /// brick contains at least one non-empty voxel, so the raymarcher
    /// can skip whole bricks of air.
    pub fn build_brick_map(&self) -> Vec<u32> {
        let dims = self.brick_dims();
        let brick_count = (dims.x * dims.y * dims.z) as usize;
        let mut words = vec![0u32; brick_count.div_ceil(32)];
        for bz in 0..dims.z {
            for by in 0..dims.y {
                for bx in 0..dims.x {
                    if self.brick_occupied(bx, by, bz) {
                        let bit = (bx + by * dims.x + bz * dims.x * dims.y) as usize;
                        words[bit / 32] |= 1 << (bit % 32);
                    }
                }
            }
        }
        words
    }

    fn brick_occupied(&self, bx: u32, by: u32, bz: u32) -> bool {
        let base = UVec3::new(bx, by, bz) * BRICK_SIZE;
        for z in base.z..(base.z + BRICK_SIZE).min(self.size.z) {
            for y in base.y..(base.y + BRICK_SIZE).min(self.size.y) {
                for x in base.x..(base.x + BRICK_SIZE).min(self.size.x) {
                    if self.get(x, y, z) != 0 {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Grayscale ramp palette; index 0 stays black but is never rendered
/// (0 means empty).
pub fn default_palette() -> [[u8; 4]; 256] {
    let mut palette = [[0u8; 4]; 256];
    for (i, entry) in palette.iter_mut().enumerate() {
        let v = i as u8;
        *entry = [v, v, v, 255];
    }
    palette
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        let size = UVec3::new(2, 2, 2);
        assert!(VoxelGrid::new(size, vec![0; 8], default_palette()).is_ok());
        let err = VoxelGrid::new(size, vec![0; 7], default_palette());
        assert!(matches!(err, Err(GridError::SizeMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_zero_extent() {
        let err = VoxelGrid::new(UVec3::new(0, 4, 4), vec![], default_palette());
        assert!(matches!(err, Err(GridError::ZeroExtent(_))));
    }

    #[test]
    fn test_get_out_of_bounds_is_empty() {
        let grid = VoxelGrid::solid(UVec3::splat(4), 7);
        assert_eq!(grid.get(0, 0, 0), 7);
        assert_eq!(grid.get(4, 0, 0), 0);
        assert_eq!(grid.get(0, 100, 0), 0);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let grid = VoxelGrid::checkerboard(UVec3::splat(4), 5);
        assert_eq!(grid.get(0, 0, 0), 5);
        assert_eq!(grid.get(1, 0, 0), 0);
        assert_eq!(grid.get(1, 1, 0), 5);
    }

    #[test]
    fn test_brick_dims_round_up() {
        let grid = VoxelGrid::solid(UVec3::new(9, 4, 1), 1);
        assert_eq!(grid.brick_dims(), UVec3::new(3, 1, 1));
    }

    #[test]
    fn test_brick_map_marks_occupied_bricks() {
        // 8x4x4 grid: two bricks along x, only the second one filled.
        let size = UVec3::new(8, 4, 4);
        let mut voxels = vec![0u8; 128];
        // voxel (5, 1, 2) lives in brick (1, 0, 0)
        voxels[5 + 8 + 2 * 32] = 3;
        let grid = VoxelGrid::new(size, voxels, default_palette()).unwrap();
        let map = grid.build_brick_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0] & 0b01, 0);
        assert_eq!(map[0] & 0b10, 0b10);
    }

    #[test]
    fn test_brick_map_solid_sets_every_bit() {
        let grid = VoxelGrid::solid(UVec3::splat(8), 1);
        let map = grid.build_brick_map();
        // 2x2x2 = 8 bricks
        assert_eq!(map.len(), 1);
        assert_eq!(map[0], 0xFF);
    }
}
