use crate::{Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Stored as a pair of corners. The empty box has `min = +inf` and
/// `max = -inf` on every axis, so the first `extend` initialises it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The empty box (contains nothing, identity for `extend`).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// The box spanned by the primitive library's unit solids, `[-0.5, 0.5]^3`.
    pub const UNIT: Aabb = Aabb {
        min: Vec3::splat(-0.5),
        max: Vec3::splat(0.5),
    };

    /// Create a box from explicit corners. No reordering is performed.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from two corner points given in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Tightest box around a set of points. Empty for an empty iterator.
    pub fn enclosing<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut aabb = Aabb::EMPTY;
        for p in points {
            aabb.extend_point(p);
        }
        aabb
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Grow the box to contain `p`. Never shrinks.
    pub fn extend_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow the box to contain `other`. Extending by an empty box is a no-op.
    pub fn extend(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// True iff `p` lies within `[min, max]` on every axis, inclusive.
    pub fn inside(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// True when the box contains no point (some axis has `min > max`).
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Per-axis size. Negative on an empty box.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    ///
    /// Ties prefer x, then y, then z.
    pub fn longest_axis(&self) -> usize {
        let size = self.extent();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The 8 corners, x varying fastest.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Parametric span over which the ray's line is inside the box.
    ///
    /// Slab method: each axis contributes an ordered pair of plane
    /// crossings, and the running span is narrowed axis by axis. There is no
    /// clamp to `t >= 0`, so a box entirely behind the origin still reports
    /// a span; callers filter by `t` after the narrow-phase test.
    pub fn slab_span(&self, r: &Ray) -> Option<Interval> {
        let mut span = Interval::UNIVERSE;

        for axis in 0..3 {
            // Division by a zero component yields +-inf, which orders correctly
            let inv = 1.0 / r.direction[axis];
            let t0 = (self.min[axis] - r.origin[axis]) * inv;
            let t1 = (self.max[axis] - r.origin[axis]) * inv;

            span = span.intersect(&Interval::ordered(t0, t1));
            if span.is_empty() {
                return None;
            }
        }

        Some(span)
    }

    /// Test if a ray's line crosses this AABB.
    pub fn hit(&self, r: &Ray) -> bool {
        self.slab_span(r).is_some()
    }
}
