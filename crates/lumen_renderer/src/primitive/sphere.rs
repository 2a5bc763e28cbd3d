//! Unit sphere: radius 0.5 centred at the origin.

use std::f32::consts::PI;

use lumen_math::{Aabb, Ray, Vec3};

use crate::hittable::{farthest, nearest, solve_quadratic, Hittable, LocalHit};

#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl Sphere {
    fn roots(ray: &Ray) -> Option<[LocalHit; 2]> {
        let p = ray.origin;
        let d = ray.direction;

        let a = d.dot(d);
        let b = 2.0 * p.dot(d);
        let c = p.dot(p) - 0.25;

        let (t0, t1) = solve_quadratic(a, b, c)?;
        // Gradient of the implicit surface
        let normal = |t: f32| 2.0 * ray.at(t);
        Some([LocalHit::new(t0, normal(t0)), LocalHit::new(t1, normal(t1))])
    }
}

/// Azimuthal U shared by the sphere and the lateral surfaces of cylinder and cone.
pub(crate) fn azimuth_u(p: Vec3) -> f32 {
    let theta = p.z.atan2(p.x);
    if theta < 0.0 {
        -theta / (2.0 * PI)
    } else {
        1.0 - theta / (2.0 * PI)
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        nearest(Self::roots(ray)?)
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        farthest(Self::roots(ray)?)
    }

    fn uv(&self, p: Vec3) -> Option<(f32, f32)> {
        let v = (p.y / 0.5).clamp(-1.0, 1.0).asin() / PI + 0.5;
        Some((azimuth_u(p), v))
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::UNIT
    }
}
