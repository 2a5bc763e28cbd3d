//! Triangle primitive and triangle meshes.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use std::sync::Arc;

use lumen_core::Mesh;
use lumen_math::{Aabb, Ray, Vec3};

use crate::bvh::Bvh;
use crate::hittable::{Hittable, LocalHit, T_MIN};

/// Determinant and distance threshold for the barycentric test.
const EPSILON: f32 = 1e-7;

/// A triangle with optional per-vertex normals for smooth shading.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normals: Option<[Vec3; 3]>,
}

impl Triangle {
    /// Create a flat-shaded triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            v0,
            v1,
            v2,
            normals: None,
        }
    }

    /// Create a triangle whose hit normal interpolates the vertex normals.
    pub fn with_normals(v0: Vec3, v1: Vec3, v2: Vec3, normals: [Vec3; 3]) -> Self {
        Self {
            v0,
            v1,
            v2,
            normals: Some(normals),
        }
    }

    /// Möller-Trumbore ray-triangle intersection.
    fn intersect(&self, ray: &Ray) -> Option<LocalHit> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t <= EPSILON {
            return None;
        }

        let normal = match self.normals {
            Some([n0, n1, n2]) => (1.0 - u - v) * n0 + u * n1 + v * n2,
            None => edge1.cross(edge2),
        };
        Some(LocalHit::new(t, normal.normalize_or_zero()))
    }
}

impl Hittable for Triangle {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        self.intersect(ray).filter(|h| h.t > T_MIN)
    }

    /// A single surface: entry and exit coincide.
    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        self.hit(ray)
    }

    fn bounding_box(&self) -> Aabb {
        // Pad thin dimensions to avoid degenerate AABBs
        let b = Aabb::enclosing([self.v0, self.v1, self.v2]);
        let delta = Vec3::splat(0.0001);
        Aabb::new(b.min - delta, b.max + delta)
    }
}

/// A mesh prepared for tracing: its triangles plus a BVH over them.
#[derive(Debug)]
pub struct MeshGeometry {
    mesh: Arc<Mesh>,
    triangles: Vec<Triangle>,
    bvh: Bvh,
}

impl MeshGeometry {
    /// Build the per-mesh BVH. Smooth shading is used when the mesh carries normals.
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let triangles: Vec<Triangle> = (0..mesh.triangle_count())
            .map(|i| {
                let [v0, v1, v2] = mesh.triangle(i);
                match mesh.triangle_normals(i) {
                    Some(normals) => Triangle::with_normals(v0, v1, v2, normals),
                    None => Triangle::new(v0, v1, v2),
                }
            })
            .collect();
        let bvh = Bvh::build(&triangles, Triangle::bounding_box);

        log::debug!(
            "Mesh BVH: {} triangles, {} nodes, depth {}",
            triangles.len(),
            bvh.node_count(),
            bvh.depth()
        );

        Self {
            mesh,
            triangles,
            bvh,
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Fold the exact hits of every BVH candidate with `keep`.
    fn search<F>(&self, ray: &Ray, keep: F) -> Option<LocalHit>
    where
        F: Fn(&LocalHit, &LocalHit) -> bool,
    {
        let mut best: Option<LocalHit> = None;
        self.bvh.for_each_candidate(ray, |i| {
            if let Some(hit) = self.triangles[i].hit(ray) {
                if best.as_ref().map_or(true, |b| !keep(b, &hit)) {
                    best = Some(hit);
                }
            }
        });
        best
    }
}

impl Hittable for MeshGeometry {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        self.search(ray, |best, hit| best.t <= hit.t)
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        self.search(ray, |best, hit| best.t >= hit.t)
    }

    /// Union of all vertex positions.
    fn bounding_box(&self) -> Aabb {
        self.mesh.bounds
    }
}
