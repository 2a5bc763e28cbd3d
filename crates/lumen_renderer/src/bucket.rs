//! Bucket-based tile rendering.
//!
//! Divides the image into square tiles (buckets) that are rendered
//! independently by a pool of workers pulling from one shared queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use lumen_core::Rgba;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::renderer::{sample_pixel, RenderConfig};
use crate::scene::RenderScene;
use crate::shading::{Tracer, BACKGROUND};

/// Smallest bucket edge in pixels.
pub const MIN_BUCKET_SIZE: u32 = 32;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    /// Width of the bucket in pixels
    pub width: u32,
    /// Height of the bucket in pixels
    pub height: u32,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the total number of pixels in this bucket.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Bucket edge for an image width and worker count.
pub fn bucket_size(width: u32, workers: usize) -> u32 {
    let workers = u32::try_from(workers.max(1)).unwrap_or(u32::MAX);
    (width / workers).max(MIN_BUCKET_SIZE)
}

/// Generate buckets in raster order, clipped at the image edges, with the
/// bucket holding the centre pixel moved to the front.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> VecDeque<Bucket> {
    let size = bucket_size.max(1);
    let (cx, cy) = (width / 2, height / 2);
    let mut buckets = VecDeque::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bucket = Bucket::new(x, y, size.min(width - x), size.min(height - y));
            if bucket.contains(cx, cy) {
                buckets.push_front(bucket);
            } else {
                buckets.push_back(bucket);
            }
            x += size;
        }
        y += size;
    }

    buckets
}

/// Work queue shared by the tile workers.
///
/// Every pop is one short critical section; rendering happens outside the lock.
#[derive(Debug, Default)]
pub struct BucketQueue {
    buckets: Mutex<VecDeque<Bucket>>,
}

impl BucketQueue {
    pub fn new(buckets: VecDeque<Bucket>) -> Self {
        Self {
            buckets: Mutex::new(buckets),
        }
    }

    /// Take the next bucket, or `None` when the queue is drained.
    pub fn pop(&self) -> Option<Bucket> {
        // A poisoned queue still holds valid buckets
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of rendering a bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    /// The bucket that was rendered
    pub bucket: Bucket,
    /// Pixels in row-major order within the bucket
    pub pixels: Vec<Rgba>,
    /// Camera rays cast for this bucket
    pub primary_rays: u64,
    /// All traced rays, primary and secondary
    pub rays: u64,
    /// Deepest recursion level reached
    pub deepest: u32,
}

impl BucketResult {
    /// Copy the bucket's pixels into a full-image buffer of the given width.
    pub fn blit(&self, buffer: &mut [Rgba], image_width: u32) {
        let w = self.bucket.width as usize;
        if w == 0 {
            return;
        }
        for (row, chunk) in self.pixels.chunks_exact(w).enumerate() {
            let start = (self.bucket.y as usize + row) * image_width as usize + self.bucket.x as usize;
            buffer[start..start + w].copy_from_slice(chunk);
        }
    }
}

/// Render a single bucket.
///
/// Each pixel seeds its own generator from its image index, so the result
/// does not depend on how the image was divided.
pub fn render_bucket(bucket: &Bucket, scene: &RenderScene, config: &RenderConfig) -> BucketResult {
    let tracer = Tracer::new(scene, config);
    let image_width = scene.width() as u64;
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);
    let mut primary_rays = 0u64;

    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            let i = bucket.x + local_x;
            let j = bucket.y + local_y;
            let mut rng = StdRng::seed_from_u64(j as u64 * image_width + i as u64);

            let (color, samples) = sample_pixel(&tracer, scene.camera(), i, j, config, &mut rng);
            primary_rays += samples as u64;

            let color = if color.is_finite() { color } else { BACKGROUND };
            pixels.push(Rgba::from_color(color));
        }
    }

    log::debug!(
        "Bucket ({}, {}) {}x{}: {} rays",
        bucket.x,
        bucket.y,
        bucket.width,
        bucket.height,
        tracer.rays()
    );

    BucketResult {
        bucket: *bucket,
        pixels,
        primary_rays,
        rays: tracer.rays(),
        deepest: tracer.deepest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn assert_exact_cover(buckets: &VecDeque<Bucket>, width: u32, height: u32) {
        let mut hits = vec![0u8; (width * height) as usize];
        for b in buckets {
            assert!(b.width > 0 && b.height > 0);
            assert!(b.x + b.width <= width && b.y + b.height <= height);
            for y in b.y..b.y + b.height {
                for x in b.x..b.x + b.width {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1), "gap or overlap in {width}x{height}");
    }

    #[test]
    fn test_generate_buckets_exact_fit() {
        let buckets = generate_buckets(128, 128, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid

        // Total pixels should equal image size
        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_buckets_partial_fit() {
        let buckets = generate_buckets(100, 100, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid with partial buckets
        assert_exact_cover(&buckets, 100, 100);
    }

    #[test]
    fn test_center_bucket_first() {
        let buckets = generate_buckets(192, 192, 64);
        assert_eq!(buckets.len(), 9); // 3x3 grid

        // First bucket should be the center one
        assert_eq!(buckets[0], Bucket::new(64, 64, 64, 64));

        // The rest stay in raster order
        let rest: Vec<(u32, u32)> = buckets.iter().skip(1).map(|b| (b.x, b.y)).collect();
        assert_eq!(
            rest,
            vec![(0, 0), (64, 0), (128, 0), (0, 64), (128, 64), (0, 128), (64, 128), (128, 128)]
        );
    }

    #[test]
    fn test_bucket_size() {
        assert_eq!(bucket_size(512, 4), 128);
        assert_eq!(bucket_size(512, 64), MIN_BUCKET_SIZE);
        assert_eq!(bucket_size(100, 1), 100);
        assert_eq!(bucket_size(100, 0), 100);
    }

    #[test]
    fn test_buckets_cover_any_image() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let width = rng.gen_range(1..300);
            let height = rng.gen_range(1..300);
            let workers = rng.gen_range(1..17);
            let buckets = generate_buckets(width, height, bucket_size(width, workers));
            assert_exact_cover(&buckets, width, height);
        }
    }

    #[test]
    fn test_queue_drains_in_order() {
        let queue = BucketQueue::new(generate_buckets(96, 64, 32));
        assert_eq!(queue.len(), 6);

        let first = queue.pop().unwrap();
        assert!(first.contains(48, 32));

        let mut count = 1;
        while queue.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_blit_empty_bucket() {
        let mut buffer: Vec<Rgba> = Vec::new();
        let result = BucketResult {
            bucket: Bucket::new(0, 0, 0, 4),
            pixels: Vec::new(),
            primary_rays: 0,
            rays: 0,
            deepest: 0,
        };
        result.blit(&mut buffer, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_blit() {
        let mut buffer = vec![Rgba::BLACK; 4 * 3];
        let result = BucketResult {
            bucket: Bucket::new(1, 1, 2, 2),
            pixels: vec![Rgba::new(1, 1, 1, 255); 4],
            primary_rays: 4,
            rays: 4,
            deepest: 0,
        };
        result.blit(&mut buffer, 4);

        let set: Vec<usize> = buffer
            .iter()
            .enumerate()
            .filter(|(_, p)| p.r == 1)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(set, vec![5, 6, 9, 10]);
    }
}
