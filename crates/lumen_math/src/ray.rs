use crate::{Mat4, Vec3};

/// A ray in 3D space with an origin and a direction.
///
/// The direction is not required to be unit length; every intersection
/// routine reports `t` in units of `direction`, so a ray and its
/// object-space image share the same parameter for the same point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Map the ray through an affine transform (origin as a point, direction as a vector).
    pub fn transformed(&self, matrix: &Mat4) -> Ray {
        Ray::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }

    /// Same origin, unit-length direction.
    pub fn normalized(&self) -> Ray {
        Ray::new(self.origin, self.direction.normalize_or_zero())
    }
}
