//! Unit cone: apex at `(0, 0.5, 0)`, base radius 0.5 at `y = -0.5`.

use lumen_math::{Aabb, Ray, Vec3};

use super::sphere::azimuth_u;
use super::CAP_EPSILON;
use crate::hittable::{farthest, nearest, solve_quadratic, Hittable, LocalHit};

/// Below this the quadratic term of the lateral equation vanishes.
const LINEAR_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct Cone;

impl Cone {
    /// Lateral normal. The slope is fixed, so only the radial part varies.
    fn body_normal(q: Vec3) -> Vec3 {
        let r = (q.x * q.x + q.z * q.z).sqrt();
        if r < 1e-6 {
            // Apex
            return Vec3::Y;
        }
        Vec3::new(q.x / r, 0.5, q.z / r)
    }

    fn candidates(ray: &Ray) -> Vec<LocalHit> {
        let p = ray.origin;
        let d = ray.direction;
        let mut hits = Vec::with_capacity(3);

        // x^2 + z^2 = ((0.5 - y) / 2)^2
        let a = d.x * d.x + d.z * d.z - 0.25 * d.y * d.y;
        let b = 2.0 * p.x * d.x + 2.0 * p.z * d.z - 0.5 * p.y * d.y + 0.25 * d.y;
        let c = p.x * p.x + p.z * p.z - 0.25 * p.y * p.y + 0.25 * p.y - 0.0625;
        let roots = match solve_quadratic(a, b, c) {
            Some((t0, t1)) => [Some(t0), Some(t1)],
            // Parallel to a generator: the equation is linear
            None if a.abs() < LINEAR_EPSILON && b.abs() > LINEAR_EPSILON => [Some(-c / b), None],
            None => [None, None],
        };
        for t in roots.into_iter().flatten() {
            let q = ray.at(t);
            if (-0.5..=0.5).contains(&q.y) {
                hits.push(LocalHit::new(t, Self::body_normal(q)));
            }
        }

        // Base
        if d.y != 0.0 {
            let t = (-0.5 - p.y) / d.y;
            let q = ray.at(t);
            if q.x * q.x + q.z * q.z <= 0.25 {
                hits.push(LocalHit::new(t, Vec3::NEG_Y));
            }
        }

        hits
    }
}

impl Hittable for Cone {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        nearest(Self::candidates(ray))
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        farthest(Self::candidates(ray))
    }

    fn uv(&self, p: Vec3) -> Option<(f32, f32)> {
        let uv = if (p.y + 0.5).abs() < CAP_EPSILON {
            (p.x + 0.5, p.z + 0.5)
        } else {
            (azimuth_u(p), p.y + 0.5)
        };
        Some(uv)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::UNIT
    }
}
