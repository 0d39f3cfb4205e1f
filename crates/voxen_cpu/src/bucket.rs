//! Bucket decomposition for parallel CPU rendering.
//!
//! The image is cut into square tiles that render independently on
//! the rayon pool, ordered center-out so an interactive consumer sees
//! the middle of the frame resolve first.

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position of this bucket in the render order.
    pub index: usize,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 64;

/// Generate buckets covering the image, sorted center-out.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, 0));
            x += bucket_size;
        }
        y += bucket_size;
    }

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    buckets.sort_by(|a, b| {
        let dist = |bucket: &Bucket| {
            let bx = bucket.x as f32 + bucket.width as f32 / 2.0;
            let by = bucket.y as f32 + bucket.height as f32 / 2.0;
            (bx - center_x).powi(2) + (by - center_y).powi(2)
        };
        dist(a)
            .partial_cmp(&dist(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_cover_exact_fit() {
        let buckets = generate_buckets(128, 128, 64);
        assert_eq!(buckets.len(), 4);
        let total: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total, 128 * 128);
    }

    #[test]
    fn test_buckets_cover_partial_fit() {
        let buckets = generate_buckets(100, 70, 64);
        assert_eq!(buckets.len(), 4);
        let total: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total, 100 * 70);
    }

    #[test]
    fn test_center_bucket_first() {
        let buckets = generate_buckets(192, 192, 64);
        assert_eq!(buckets.len(), 9);
        assert_eq!((buckets[0].x, buckets[0].y), (64, 64));
    }
}
