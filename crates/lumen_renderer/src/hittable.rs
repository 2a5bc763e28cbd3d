//! Hittable trait, local hits, and world-space hit records.

use lumen_math::{Aabb, Ray, Vec3};

/// Smallest accepted ray parameter for a primitive hit.
///
/// Measured in units of the (object-space) ray direction.
pub const T_MIN: f32 = 1e-4;

/// An intersection in a primitive's own object space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalHit {
    /// Ray parameter of the hit
    pub t: f32,
    /// Outward surface normal, not necessarily unit length
    pub normal: Vec3,
}

impl LocalHit {
    pub fn new(t: f32, normal: Vec3) -> Self {
        Self { t, normal }
    }
}

/// Record of the nearest ray-scene intersection, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Point of intersection
    pub p: Vec3,
    /// Outward unit normal (not yet flipped toward the ray)
    pub normal: Vec3,
    /// Index of the intersected shape
    pub shape: usize,
}

impl HitRecord {
    /// Normal oriented against the incoming direction.
    pub fn facing_normal(&self, direction: Vec3) -> Vec3 {
        if self.normal.dot(direction) > 0.0 {
            -self.normal
        } else {
            self.normal
        }
    }

    /// True when the ray arrives from outside the surface.
    pub fn front_face(&self, direction: Vec3) -> bool {
        self.normal.dot(direction) < 0.0
    }
}

/// Trait for objects that can be hit by rays, in their own object space.
pub trait Hittable: Send + Sync {
    /// Nearest valid hit (`t > T_MIN`) among all of the object's surfaces.
    fn hit(&self, ray: &Ray) -> Option<LocalHit>;

    /// Farthest valid hit: where a ray that starts inside the solid leaves it.
    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit>;

    /// Texture coordinates of a surface point, if the object supports texturing.
    fn uv(&self, _p: Vec3) -> Option<(f32, f32)> {
        None
    }

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

/// Keep the smallest valid `t` from a set of candidates.
///
/// Comparison is strict, so among equal `t` the first candidate wins.
pub(crate) fn nearest<I>(candidates: I) -> Option<LocalHit>
where
    I: IntoIterator<Item = LocalHit>,
{
    candidates
        .into_iter()
        .filter(|h| h.t > T_MIN && h.t.is_finite())
        .fold(None, |best: Option<LocalHit>, h| match best {
            Some(b) if b.t <= h.t => Some(b),
            _ => Some(h),
        })
}

/// Keep the largest valid `t` from a set of candidates.
pub(crate) fn farthest<I>(candidates: I) -> Option<LocalHit>
where
    I: IntoIterator<Item = LocalHit>,
{
    candidates
        .into_iter()
        .filter(|h| h.t > T_MIN && h.t.is_finite())
        .fold(None, |best: Option<LocalHit>, h| match best {
            Some(b) if b.t >= h.t => Some(b),
            _ => Some(h),
        })
}

/// Real roots of `a t^2 + b t + c = 0`, smaller first.
///
/// A negative discriminant or a vanishing leading coefficient is a miss.
pub(crate) fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a.abs() < 1e-12 {
        return None;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t0 = (-b - root) / (2.0 * a);
    let t1 = (-b + root) / (2.0 * a);
    Some((t0.min(t1), t0.max(t1)))
}
