//! Primitive geometry library.
//!
//! Every primitive lives in its own object space. The quadrics and the cube
//! fill `[-0.5, 0.5]^3`; triangles and meshes use their vertex positions.

mod cone;
mod cube;
mod cylinder;
mod sphere;
mod triangle;

pub use cone::Cone;
pub use cube::Cube;
pub use cylinder::Cylinder;
pub use sphere::Sphere;
pub use triangle::{MeshGeometry, Triangle};

use std::sync::Arc;

use lumen_math::{Aabb, Ray, Vec3};

use crate::hittable::{Hittable, LocalHit};

/// Tolerance for deciding that a point lies on a flat cap.
pub(crate) const CAP_EPSILON: f32 = 1e-5;

/// The geometry behind one scene shape.
#[derive(Debug)]
pub enum Geometry {
    Sphere(Sphere),
    Cube(Cube),
    Cylinder(Cylinder),
    Cone(Cone),
    /// Shared by every shape instancing the same mesh file
    Mesh(Arc<MeshGeometry>),
}

impl Geometry {
    fn as_hittable(&self) -> &dyn Hittable {
        match self {
            Geometry::Sphere(g) => g,
            Geometry::Cube(g) => g,
            Geometry::Cylinder(g) => g,
            Geometry::Cone(g) => g,
            Geometry::Mesh(g) => g.as_ref(),
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, Geometry::Mesh(_))
    }
}

impl Hittable for Geometry {
    fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        self.as_hittable().hit(ray)
    }

    fn hit_inside(&self, ray: &Ray) -> Option<LocalHit> {
        self.as_hittable().hit_inside(ray)
    }

    fn uv(&self, p: Vec3) -> Option<(f32, f32)> {
        self.as_hittable().uv(p)
    }

    fn bounding_box(&self) -> Aabb {
        self.as_hittable().bounding_box()
    }
}
