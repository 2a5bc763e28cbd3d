//! Image-space post filters over the 8-bit output.
//!
//! Both filters use a square window of `floor(sqrt(kernel_size))` pixels
//! per side and wrap around the image edges.

use lumen_core::Rgba;
use serde::Deserialize;

/// Spatial sigma of the bilateral filter, in pixels.
const SPATIAL_SIGMA: f32 = 3.0;

/// Range sigma of the bilateral filter, in 8-bit RGB distance.
const RANGE_SIGMA: f32 = 30.0;

/// Post filter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFilter {
    #[default]
    None,
    /// Edge-preserving blur
    Bilateral { kernel_size: u32 },
    /// Per-channel median
    Median { kernel_size: u32 },
}

/// Run the selected filter over a `width * height` buffer in place.
pub fn apply(buffer: &mut [Rgba], width: u32, height: u32, filter: PostFilter) {
    match filter {
        PostFilter::None => {}
        PostFilter::Bilateral { kernel_size } => bilateral(buffer, width, height, kernel_size),
        PostFilter::Median { kernel_size } => median(buffer, width, height, kernel_size),
    }
}

fn window_dimension(kernel_size: u32) -> i64 {
    (kernel_size as f64).sqrt().floor() as i64
}

/// Pixel at `(x, y)` with both coordinates wrapped into the image.
fn wrapped(buffer: &[Rgba], width: i64, height: i64, x: i64, y: i64) -> Rgba {
    let x = x.rem_euclid(width);
    let y = y.rem_euclid(height);
    buffer[(y * width + x) as usize]
}

/// Bilateral filter: spatial and range Gaussian weights per window pixel.
pub fn bilateral(buffer: &mut [Rgba], width: u32, height: u32, kernel_size: u32) {
    let dim = window_dimension(kernel_size);
    if dim < 1 || width == 0 || height == 0 {
        return;
    }
    let (w, h) = (width as i64, height as i64);
    let source = buffer.to_vec();

    for r in 0..h {
        for c in 0..w {
            let center = source[(r * w + c) as usize];
            let (start_x, start_y) = (c - dim / 2, r - dim / 2);

            let mut weight_sum = 0.0f32;
            let mut acc = [0.0f32; 3];
            for fy in 0..dim {
                for fx in 0..dim {
                    let (x, y) = (start_x + fx, start_y + fy);
                    let pixel = wrapped(&source, w, h, x, y);

                    let (dx, dy) = ((x - c) as f32, (y - r) as f32);
                    let spatial = (-(dx * dx + dy * dy) / (2.0 * SPATIAL_SIGMA * SPATIAL_SIGMA)).exp();

                    let dr = pixel.r as f32 - center.r as f32;
                    let dg = pixel.g as f32 - center.g as f32;
                    let db = pixel.b as f32 - center.b as f32;
                    let distance2 = dr * dr + dg * dg + db * db;
                    let range = (-distance2 / (2.0 * RANGE_SIGMA * RANGE_SIGMA)).exp();

                    let weight = spatial * range;
                    weight_sum += weight;
                    acc[0] += pixel.r as f32 * weight;
                    acc[1] += pixel.g as f32 * weight;
                    acc[2] += pixel.b as f32 * weight;
                }
            }

            // The centre always weighs 1, so the sum is positive
            let channel = |v: f32| (v / weight_sum).round().clamp(0.0, 255.0) as u8;
            buffer[(r * w + c) as usize] =
                Rgba::new(channel(acc[0]), channel(acc[1]), channel(acc[2]), 255);
        }
    }
}

/// Median filter, each channel ranked independently.
pub fn median(buffer: &mut [Rgba], width: u32, height: u32, kernel_size: u32) {
    let dim = window_dimension(kernel_size);
    if dim < 1 || width == 0 || height == 0 {
        return;
    }
    let (w, h) = (width as i64, height as i64);
    let source = buffer.to_vec();
    let n = (dim * dim) as usize;
    let (mut rs, mut gs, mut bs) = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));

    for r in 0..h {
        for c in 0..w {
            rs.clear();
            gs.clear();
            bs.clear();
            for fy in 0..dim {
                for fx in 0..dim {
                    let pixel = wrapped(&source, w, h, c - dim / 2 + fx, r - dim / 2 + fy);
                    rs.push(pixel.r);
                    gs.push(pixel.g);
                    bs.push(pixel.b);
                }
            }
            rs.sort_unstable();
            gs.sort_unstable();
            bs.sort_unstable();
            buffer[(r * w + c) as usize] = Rgba::new(rs[n / 2], gs[n / 2], bs[n / 2], 255);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(v: u8) -> Rgba {
        Rgba::new(v, v, v, 255)
    }

    #[test]
    fn test_none_is_identity() {
        let mut buffer = vec![gray(10), gray(200), gray(30), gray(40)];
        let before = buffer.clone();
        apply(&mut buffer, 2, 2, PostFilter::None);
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_filters_keep_flat_image() {
        for filter in [
            PostFilter::Bilateral { kernel_size: 9 },
            PostFilter::Median { kernel_size: 9 },
        ] {
            let mut buffer = vec![Rgba::new(12, 34, 56, 255); 5 * 4];
            apply(&mut buffer, 5, 4, filter);
            assert!(buffer.iter().all(|p| *p == Rgba::new(12, 34, 56, 255)));
        }
    }

    #[test]
    fn test_median_removes_outlier() {
        let mut buffer = vec![gray(50); 5 * 5];
        buffer[2 * 5 + 2] = gray(255);
        median(&mut buffer, 5, 5, 9);
        assert_eq!(buffer[2 * 5 + 2], gray(50));
    }

    #[test]
    fn test_median_wraps_edges() {
        // A bright column on the right edge is a neighbour of column 0
        let mut buffer = vec![gray(0); 4 * 3];
        for y in 0..3 {
            buffer[y * 4 + 3] = gray(100);
            buffer[y * 4 + 2] = gray(100);
        }
        median(&mut buffer, 4, 3, 9);
        // Column 3 sees columns 2, 3 and 0 (wrapped): two of three are bright
        assert_eq!(buffer[3], gray(100));
    }

    #[test]
    fn test_bilateral_smooths_small_noise() {
        let mut buffer = vec![gray(100); 5 * 5];
        buffer[2 * 5 + 2] = gray(110);
        bilateral(&mut buffer, 5, 5, 9);
        let v = buffer[2 * 5 + 2].r;
        assert!(v > 100 && v < 110, "got {v}");
    }

    #[test]
    fn test_bilateral_preserves_strong_edge() {
        // Left half black, right half white: range weights suppress mixing
        let mut buffer = vec![gray(0); 6 * 4];
        for y in 0..4 {
            for x in 3..6 {
                buffer[y * 6 + x] = gray(255);
            }
        }
        bilateral(&mut buffer, 6, 4, 9);
        assert_eq!(buffer[6 + 2], gray(0));
        assert_eq!(buffer[6 + 3], gray(255));
    }

    #[test]
    fn test_small_kernel_is_identity() {
        let mut buffer = vec![gray(1), gray(2), gray(3), gray(4)];
        let before = buffer.clone();
        median(&mut buffer, 2, 2, 1);
        assert_eq!(buffer, before);
        bilateral(&mut buffer, 2, 2, 3);
        assert_eq!(buffer, before);
    }
}
