//! Unit cylinder: radius 0.5 around the y axis, capped at `y = ±0.5`.

use lumen_math::{Aabb, Ray, Vec3};

use super::sphere::azimuth_u;
use super::CAP_EPSILON;
use crate::hittable::{farthest, nearest, solve_quadratic, Hittable, LocalHit};

#[derive(Debug, Clone, Copy, Default)]
pub struct Cylinder;

impl Cylinder {
    fn candidates(ray: &Ray) -> Vec<LocalHit> {
        let p = ray.origin;
        let d = ray.direction;
        let mut hits = Vec::with_capacity(4);

        // Lateral surface x^2 + z^2 = 0.25
        let a = d.x * d.x + d.z * d.z;
        let b = 2.0 * (p.x * d.x + p.z * d.z);
        let c = p.x * p.x + p.z * p.z - 0.25;
        if let Some((t0, t1)) = solve_quadratic(a, b, c) {
            for t in [t0, t1] {
                let q = ray.at(t);
                if (-0.5..=0.5).contains(&q.y) {
                    hits.push(LocalHit::new(t, Vec3::new(2.0 * q.x, 0.0, 2.0 * q.z)));
                }
            }
        }

        // Caps
        if d.y != 0.0 {
            for plane in [0.5f32, -0.5] {
                let t = (plane - p.y) / d.y;
                let q = ray.at(t);
                if q.x * q.x + q.z * q.z <= 0.25 {
                    hits.push(LocalHit::new(t, Vec3::new(0.0, plane.signum(), 0.0)));
                }
            }
        }

        hits
    }
}

impl Hittable for Cylinder {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        nearest(Self::candidates(ray))
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        farthest(Self::candidates(ray))
    }

    fn uv(&self, p: Vec3) -> Option<(f32, f32)> {
        let uv = if (p.y + 0.5).abs() < CAP_EPSILON {
            (p.x + 0.5, p.z + 0.5)
        } else if (p.y - 0.5).abs() < CAP_EPSILON {
            (p.x + 0.5, -p.z + 0.5)
        } else {
            (azimuth_u(p), p.y + 0.5)
        };
        Some(uv)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::UNIT
    }
}
