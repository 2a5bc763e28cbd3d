//! 8-bit output pixel.

use bytemuck::{Pod, Zeroable};
use lumen_math::Vec3;

/// One RGBA8 pixel of the output buffer.
///
/// `#[repr(C)]` so a `&[Rgba]` can be viewed as raw bytes for PNG encoding.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert a radiance triple to 8-bit, clamping each channel to [0, 1] first.
    ///
    /// Non-finite channels map to 0.
    pub fn from_color(color: Vec3) -> Self {
        Self::new(
            unit_to_u8(color.x),
            unit_to_u8(color.y),
            unit_to_u8(color.z),
            255,
        )
    }
}

fn unit_to_u8(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
