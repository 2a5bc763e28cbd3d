//! Unit cube: the box `[-0.5, 0.5]^3`.

use lumen_math::{Aabb, Ray, Vec3};

use crate::hittable::{farthest, nearest, Hittable, LocalHit};

/// Face tolerance used to decide which face a surface point lies on.
const FACE_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
pub struct Cube;

impl Cube {
    /// Crossings with the six face planes that land inside the face square.
    fn face_hits(ray: &Ray) -> impl Iterator<Item = LocalHit> + '_ {
        (0..3).flat_map(move |axis| {
            [0.5f32, -0.5].into_iter().filter_map(move |plane| {
                let d = ray.direction[axis];
                if d == 0.0 {
                    return None;
                }
                let t = (plane - ray.origin[axis]) / d;
                let q = ray.at(t);
                let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
                let on_face = (-0.5..=0.5).contains(&q[a]) && (-0.5..=0.5).contains(&q[b]);
                if !on_face {
                    return None;
                }
                let mut normal = Vec3::ZERO;
                normal[axis] = plane.signum();
                Some(LocalHit::new(t, normal))
            })
        })
    }
}

impl Hittable for Cube {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        nearest(Self::face_hits(ray))
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        farthest(Self::face_hits(ray))
    }

    /// Planar UV per face, oriented so each face reads upright from outside.
    fn uv(&self, p: Vec3) -> Option<(f32, f32)> {
        let on = |value: f32, plane: f32| (value - plane).abs() < FACE_EPSILON;
        let uv = if on(p.x, 0.5) {
            (-p.z + 0.5, p.y + 0.5)
        } else if on(p.x, -0.5) {
            (p.z + 0.5, p.y + 0.5)
        } else if on(p.y, 0.5) {
            (p.x + 0.5, -p.z + 0.5)
        } else if on(p.y, -0.5) {
            (p.x + 0.5, p.z + 0.5)
        } else if on(p.z, 0.5) {
            (p.x + 0.5, p.y + 0.5)
        } else {
            (-p.x + 0.5, p.y + 0.5)
        };
        Some(uv)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::UNIT
    }
}
