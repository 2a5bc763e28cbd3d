//! Camera for ray generation.

use std::f32::consts::PI;

use lumen_core::CameraDesc;
use lumen_math::{Mat3, Ray, Vec3};
use rand::Rng;

/// Pinhole camera with an optional thin lens, bound to an image size.
///
/// Camera space is right-handed with the view along -z. Pixel coordinates
/// are continuous: `(i, j)` addresses the centre of pixel `(i, j)` and
/// fractional values address sub-pixel positions.
#[derive(Debug, Clone)]
pub struct Camera {
    eye: Vec3,
    /// Columns are the camera's right, up and backward axes in world space
    basis: Mat3,
    width: u32,
    height: u32,
    // Image plane extents at unit distance
    span_u: f32,
    span_v: f32,
    aperture: f32,
    focal_length: f32,
}

impl Camera {
    pub fn new(desc: &CameraDesc, width: u32, height: u32) -> Self {
        let w = (-desc.look).normalize_or_zero();
        let v = (desc.up - desc.up.dot(w) * w).normalize_or_zero();
        let u = v.cross(w);

        let height_span = 2.0 * (desc.height_angle / 2.0).tan();
        let aspect = width.max(1) as f32 / height.max(1) as f32;

        Self {
            eye: desc.position,
            basis: Mat3::from_cols(u, v, w),
            width: width.max(1),
            height: height.max(1),
            span_u: height_span * aspect,
            span_v: height_span,
            aperture: desc.aperture,
            focal_length: desc.focal_length,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// True when lens sampling is meaningful for this camera.
    pub fn has_lens(&self) -> bool {
        self.aperture > 0.0 && self.focal_length > 0.0
    }

    /// Camera-space direction through an image position; z is always -1.
    fn camera_direction(&self, px: f32, py: f32) -> Vec3 {
        let x = (px + 0.5) / self.width as f32 - 0.5;
        let y = (self.height as f32 - 1.0 - py + 0.5) / self.height as f32 - 0.5;
        Vec3::new(self.span_u * x, self.span_v * y, -1.0)
    }

    /// Primary ray from the eye through an image position.
    pub fn ray(&self, px: f32, py: f32) -> Ray {
        let dir = self.basis * self.camera_direction(px, py);
        Ray::new(self.eye, dir.normalize())
    }

    /// Thin-lens ray: the origin is jittered over a disk of radius
    /// `aperture / 2` and the ray re-aimed at the pinhole ray's point on the
    /// focal plane, so every lens ray for a position converges there.
    ///
    /// Falls back to [`Camera::ray`] without a usable lens.
    pub fn lens_ray<R: Rng + ?Sized>(&self, px: f32, py: f32, rng: &mut R) -> Ray {
        if !self.has_lens() {
            return self.ray(px, py);
        }

        let radius = 0.5 * self.aperture * rng.gen::<f32>().sqrt();
        let theta = 2.0 * PI * rng.gen::<f32>();
        let offset = Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0);

        let focus = self.focal_length * self.camera_direction(px, py);
        let dir = self.basis * (focus - offset);
        Ray::new(self.eye + self.basis * offset, dir.normalize())
    }
}
