// Transform utilities for Mat4
//
// glam already provides transform_point3/transform_vector3 and inverse();
// this adds the bounding-box and normal transforms used when placing shapes.

use crate::Aabb;
use glam::{Mat3, Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    ///
    /// Computes the bounding box of all 8 transformed corners. For rotated
    /// boxes this over-approximates the true bounds.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Inverse-transpose of the upper 3x3 block, the matrix that carries
    /// object-space normals to world space.
    fn normal_matrix(&self) -> Mat3;

    /// Carry an object-space normal to world space and renormalise.
    fn transform_normal(&self, normal: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        Aabb::enclosing(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }

    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }

    fn transform_normal(&self, normal: Vec3) -> Vec3 {
        (self.normal_matrix() * normal).normalize_or_zero()
    }
}
