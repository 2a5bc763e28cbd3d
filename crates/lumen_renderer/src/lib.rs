//! Lumen Renderer - Whitted-style CPU ray tracing
//!
//! Recursive ray tracer over implicit unit primitives and triangle meshes,
//! accelerated by a bounding volume hierarchy and rendered in parallel
//! tiles (buckets).
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{load_scene, Rgba};
//! use lumen_renderer::{render, RenderConfig, RenderScene};
//!
//! let scene = load_scene("scenes/spheres.json")?;
//! let prepared = RenderScene::from_scene(&scene, 512, 512)?;
//! let mut buffer = vec![Rgba::BLACK; 512 * 512];
//! let stats = render(&mut buffer, &prepared, &RenderConfig::default())?;
//! ```

mod bucket;
mod bvh;
mod camera;
mod filter;
mod hittable;
mod primitive;
mod renderer;
mod scene;
mod shading;

pub use bucket::{
    bucket_size, generate_buckets, render_bucket, Bucket, BucketQueue, BucketResult,
    MIN_BUCKET_SIZE,
};
pub use bvh::{Bvh, BvhNode};
pub use camera::Camera;
pub use filter::{bilateral, median, PostFilter};
pub use hittable::{HitRecord, Hittable, LocalHit, T_MIN};
pub use primitive::{Cone, Cube, Cylinder, Geometry, MeshGeometry, Sphere, Triangle};
pub use renderer::{
    render, sample_pixel, ReflectionGate, RenderConfig, RenderError, RenderStats,
};
pub use scene::{RenderScene, RenderShape};
pub use shading::{
    distance_attenuation, reflect, refract, spot_falloff, Tracer, BACKGROUND, SURFACE_BIAS,
};

/// Re-export Vec3 and common math types from lumen_math
pub use lumen_math::{Aabb, Interval, Ray, Vec3};
