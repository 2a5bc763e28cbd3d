//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over item indices. Leaves carry exactly one item, branches
//! own both children, and every node's box is the union of its subtree's
//! boxes. The same structure indexes either a scene's shapes or a single
//! mesh's triangles; only the per-item box function differs.
//!
//! Traversal is a broad phase only: it returns every item whose leaf is
//! reached through boxes the ray crosses, and leaves the exact test to the
//! caller.

use lumen_math::{Aabb, Ray};

/// BVH node, owning its children.
#[derive(Debug)]
pub enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node with a single item.
    Leaf { index: usize, bbox: Aabb },
}

impl BvhNode {
    pub fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    /// Recursive median-split construction.
    ///
    /// Sort items by box centroid along the longest axis of their union,
    /// split in half by count, recurse.
    fn build(items: &mut [(usize, Aabb)]) -> Self {
        if let [(index, bbox)] = items {
            return BvhNode::Leaf {
                index: *index,
                bbox: *bbox,
            };
        }

        let bounds = items.iter().fold(Aabb::EMPTY, |acc, (_, b)| {
            Aabb::surrounding(&acc, b)
        });
        let axis = bounds.longest_axis();

        items.sort_unstable_by(|(_, a), (_, b)| {
            a.centroid()[axis]
                .partial_cmp(&b.centroid()[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = items.len() / 2;
        let (left_items, right_items) = items.split_at_mut(mid);

        BvhNode::Branch {
            left: Box::new(Self::build(left_items)),
            right: Box::new(Self::build(right_items)),
            bbox: bounds,
        }
    }

    fn visit<F: FnMut(usize)>(&self, ray: &Ray, f: &mut F) {
        match self {
            // Reached through a passing parent: no test of its own
            BvhNode::Leaf { index, .. } => f(*index),
            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray) {
                    return;
                }
                left.visit(ray, f);
                right.visit(ray, f);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn node_count(&self) -> usize {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}

/// A built hierarchy over `len` items. Empty input yields an empty tree.
#[derive(Debug, Default)]
pub struct Bvh {
    root: Option<BvhNode>,
    len: usize,
}

impl Bvh {
    /// Build over precomputed per-item boxes; leaf indices refer to `boxes`.
    pub fn new(boxes: &[Aabb]) -> Self {
        if boxes.is_empty() {
            return Self::default();
        }
        let mut items: Vec<(usize, Aabb)> = boxes.iter().copied().enumerate().collect();
        Self {
            root: Some(BvhNode::build(&mut items)),
            len: boxes.len(),
        }
    }

    /// Build over arbitrary items with a box function.
    pub fn build<T, F>(items: &[T], bounds: F) -> Self
    where
        F: Fn(&T) -> Aabb,
    {
        let boxes: Vec<Aabb> = items.iter().map(bounds).collect();
        Self::new(&boxes)
    }

    /// Call `f` with every item whose leaf box the ray's line crosses.
    ///
    /// Conservative: may include items the ray misses, never omits one it hits.
    pub fn for_each_candidate<F: FnMut(usize)>(&self, ray: &Ray, mut f: F) {
        if let Some(root) = &self.root {
            root.visit(ray, &mut f);
        }
    }

    /// Collected form of [`Bvh::for_each_candidate`].
    pub fn candidates(&self, ray: &Ray) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_candidate(ray, |i| out.push(i));
        out
    }

    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.root
            .as_ref()
            .map_or(Aabb::EMPTY, BvhNode::bounding_box)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 0 for an empty tree.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::depth)
    }

    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::node_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
    }

    fn check_node_bounds(node: &BvhNode, boxes: &[Aabb]) -> Aabb {
        match node {
            BvhNode::Leaf { index, bbox } => {
                assert_eq!(*bbox, boxes[*index]);
                *bbox
            }
            BvhNode::Branch { left, right, bbox } => {
                let l = check_node_bounds(left, boxes);
                let r = check_node_bounds(right, boxes);
                let union = Aabb::surrounding(&l, &r);
                // Never smaller than the union of the children
                assert!(bbox.inside(union.min) && bbox.inside(union.max));
                *bbox
            }
        }
    }

    fn collect_leaves(node: &BvhNode, out: &mut Vec<usize>) {
        match node {
            BvhNode::Leaf { index, .. } => out.push(*index),
            BvhNode::Branch { left, right, .. } => {
                collect_leaves(left, out);
                collect_leaves(right, out);
            }
        }
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = Bvh::new(&[]);
        assert!(bvh.is_empty());
        assert!(bvh.root().is_none());
        assert_eq!(bvh.depth(), 0);
        assert!(bvh.candidates(&Ray::new(Vec3::ZERO, Vec3::Z)).is_empty());
    }

    #[test]
    fn test_bvh_single_item_is_leaf() {
        let bvh = Bvh::new(&[unit_box_at(Vec3::new(0.0, 0.0, -1.0))]);
        assert!(matches!(bvh.root(), Some(BvhNode::Leaf { index: 0, .. })));

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bvh.candidates(&ray), vec![0]);
    }

    #[test]
    fn test_bvh_every_item_in_one_leaf() {
        let mut rng = StdRng::seed_from_u64(42);
        let boxes: Vec<Aabb> = (0..37)
            .map(|_| {
                unit_box_at(Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                ))
            })
            .collect();
        let bvh = Bvh::new(&boxes);

        let mut leaves = Vec::new();
        collect_leaves(bvh.root().unwrap(), &mut leaves);
        leaves.sort_unstable();
        assert_eq!(leaves, (0..37).collect::<Vec<_>>());

        // Binary tree with one item per leaf
        assert_eq!(bvh.node_count(), 2 * 37 - 1);
        check_node_bounds(bvh.root().unwrap(), &boxes);
    }

    #[test]
    fn test_bvh_depth_is_logarithmic() {
        let boxes: Vec<Aabb> = (0..64)
            .map(|i| unit_box_at(Vec3::new(i as f32 * 2.0, 0.0, 0.0)))
            .collect();
        let bvh = Bvh::new(&boxes);
        // 64 leaves split evenly by count
        assert_eq!(bvh.depth(), 7);
    }

    #[test]
    fn test_bvh_splits_on_longest_axis() {
        // Spread along y: the root split separates low y from high y
        let boxes: Vec<Aabb> = (0..4)
            .map(|i| unit_box_at(Vec3::new(0.0, i as f32 * 3.0, 0.0)))
            .collect();
        let bvh = Bvh::new(&boxes);

        let Some(BvhNode::Branch { left, right, .. }) = bvh.root() else {
            panic!("expected a branch at the root");
        };
        let mut l = Vec::new();
        let mut r = Vec::new();
        collect_leaves(left, &mut l);
        collect_leaves(right, &mut r);
        l.sort_unstable();
        r.sort_unstable();
        assert_eq!(l, vec![0, 1]);
        assert_eq!(r, vec![2, 3]);
    }

    #[test]
    fn test_bvh_candidates_superset_of_box_hits() {
        let mut rng = StdRng::seed_from_u64(42);
        let boxes: Vec<Aabb> = (0..50)
            .map(|_| {
                unit_box_at(Vec3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                ))
            })
            .collect();
        let bvh = Bvh::new(&boxes);

        for _ in 0..200 {
            let origin = Vec3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let ray = Ray::new(origin, dir);
            let found = bvh.candidates(&ray);
            for (i, b) in boxes.iter().enumerate() {
                if b.hit(&ray) {
                    assert!(found.contains(&i), "box {i} crossed but not reported");
                }
            }
        }
    }

    #[test]
    fn test_bvh_build_with_key_fn() {
        let centers = [Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)];
        let bvh = Bvh::build(&centers, |c| unit_box_at(*c));
        assert_eq!(bvh.len(), 2);

        let ray = Ray::new(Vec3::new(4.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(bvh.candidates(&ray).contains(&1));

        // Passes above the root box
        let ray = Ray::new(Vec3::new(4.0, 3.0, 5.0), Vec3::NEG_Z);
        assert!(bvh.candidates(&ray).is_empty());
        let b = bvh.bounding_box();
        assert!((b.max.x - 4.5).abs() < 1e-6);
        assert!((b.min.x + 0.5).abs() < 1e-6);
    }
}
