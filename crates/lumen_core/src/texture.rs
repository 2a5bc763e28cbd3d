//! Texture loading, caching, and filtered sampling.
//!
//! Images are decoded once with the `image` crate and kept as normalised
//! RGBA floats. A texture that fails to load is cached as an empty
//! texture so the render can continue without it; sampling an empty
//! texture yields `None`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lumen_math::Vec3;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// How texels are combined when sampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    /// Single texel lookup
    #[default]
    Nearest,

    /// Bilinear blend of the 4 surrounding texels with smoothstep weights
    Smoothstep,

    /// Cubic convolution over the 4x4 surrounding texels
    Bicubic,
}

/// A loaded texture with pixel data.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Texture width in pixels
    pub width: u32,

    /// Texture height in pixels
    pub height: u32,

    /// Pixel data as [R, G, B, A] in 0-1, row-major, top row first
    pub pixels: Vec<[f32; 4]>,

    /// Original file path (for debugging)
    pub path: String,
}

impl Texture {
    /// Create a new texture from pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>, path: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixels,
            path: path.into(),
        }
    }

    /// A texture with no pixels, standing in for one that failed to load.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::new(0, 0, Vec::new(), path)
    }

    /// Decode an image file.
    pub fn load(path: impl AsRef<Path>) -> TextureResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        let pixels = rgba
            .pixels()
            .map(|p| {
                [
                    p[0] as f32 / 255.0,
                    p[1] as f32 / 255.0,
                    p[2] as f32 / 255.0,
                    p[3] as f32 / 255.0,
                ]
            })
            .collect();

        Ok(Self::new(width, height, pixels, path.to_string_lossy()))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.len() < (self.width * self.height) as usize
    }

    /// Sample the texture at tiled UV coordinates in [0, 1).
    ///
    /// `(0, 0)` is the bottom-left of the image. Texel addresses outside
    /// the image are clamped to the nearest edge texel, and the result is
    /// clamped to [0, 1]. Returns `None` for an empty texture.
    pub fn sample(&self, u: f32, v: f32, filter: TextureFilter) -> Option<Vec3> {
        if self.is_empty() {
            return None;
        }

        let w = self.width as f32;
        let h = self.height as f32;

        let color = match filter {
            TextureFilter::Nearest => {
                let c = (u * w) as i64;
                let r = self.height as i64 - 1 - (v * h) as i64;
                self.texel(c, r)
            }
            TextureFilter::Smoothstep => {
                let x = u * w;
                let y = h - 1.0 - v * h;
                let (x0, y0) = (x.floor(), y.floor());
                let (ax, ay) = (x - x0, y - y0);
                let (c, r) = (x0 as i64, y0 as i64);

                let top = smooth_lerp(self.texel(c, r), self.texel(c + 1, r), ax);
                let bottom = smooth_lerp(self.texel(c, r + 1), self.texel(c + 1, r + 1), ax);
                smooth_lerp(top, bottom, ay)
            }
            TextureFilter::Bicubic => {
                let x = u * w;
                let y = h - 1.0 - v * h;
                let (x0, y0) = (x.floor(), y.floor());
                let (c, r) = (x0 as i64, y0 as i64);

                let mut rows = [Vec3::ZERO; 4];
                for (j, row) in rows.iter_mut().enumerate() {
                    let rr = r + j as i64 - 1;
                    *row = cubic(
                        self.texel(c - 1, rr),
                        self.texel(c, rr),
                        self.texel(c + 1, rr),
                        self.texel(c + 2, rr),
                        x - x0,
                    );
                }
                cubic(rows[0], rows[1], rows[2], rows[3], y - y0)
            }
        };

        Some(color.clamp(Vec3::ZERO, Vec3::ONE))
    }

    /// RGB at integer texel coordinates, clamped to the image edge.
    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let [r, g, b, _] = self.pixels[y * self.width as usize + x];
        Vec3::new(r, g, b)
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<[f32; 4]>()
    }
}

fn smooth_lerp(a: Vec3, b: Vec3, alpha: f32) -> Vec3 {
    let ease = 3.0 * alpha * alpha - 2.0 * alpha * alpha * alpha;
    a + (b - a) * ease
}

/// Catmull-Rom through p1..p2 at `t` in [0, 1].
fn cubic(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let a = 3.0 * p1 - 3.0 * p2 + p3 - p0;
    let b = 2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3;
    let c = p2 - p0;
    let d = 2.0 * p1;
    (((a * t + b) * t + c) * t + d) * 0.5
}

/// Cache for loaded textures.
///
/// Populated before rendering starts; workers only read from it through
/// the `Arc`s handed out here.
#[derive(Default)]
pub struct TextureCache {
    /// Cached textures by file path
    textures: HashMap<String, Arc<Texture>>,
}

impl TextureCache {
    /// Create a new empty texture cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a texture from file, using cache if available.
    pub fn load(&mut self, path: &str) -> TextureResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let texture = Arc::new(Texture::load(path)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    /// Load a texture, degrading to an empty one on failure.
    ///
    /// The failure is logged once; later lookups hit the cached empty texture.
    pub fn load_or_empty(&mut self, path: &str) -> Arc<Texture> {
        match self.load(path) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("Texture {} unavailable, rendering without it: {}", path, e);
                let empty = Arc::new(Texture::empty(path));
                self.textures.insert(path.to_string(), empty.clone());
                empty
            }
        }
    }

    /// Insert an already-decoded texture under a key.
    pub fn insert(&mut self, path: impl Into<String>, texture: Texture) -> Arc<Texture> {
        let texture = Arc::new(texture);
        self.textures.insert(path.into(), texture.clone());
        texture
    }

    /// Get a cached texture without loading.
    pub fn get(&self, path: &str) -> Option<Arc<Texture>> {
        self.textures.get(path).cloned()
    }

    /// Get the number of cached textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Get total memory usage of cached textures.
    pub fn total_size_bytes(&self) -> usize {
        self.textures.values().map(|t| t.size_bytes()).sum()
    }
}
