//! Render configuration and entry point.
//!
//! Implements the per-pixel sampling modes:
//! - A single camera ray through the pixel
//! - Adaptive supersampling from the pixel corners
//! - Thin-lens depth of field over a 3x3 sub-pixel grid
//!
//! and drives the tile workers, serially or on a rayon pool.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::info;
use lumen_core::{MeshError, Rgba, TextureFilter};
use lumen_math::Vec3;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::bucket::{bucket_size, generate_buckets, render_bucket, Bucket, BucketQueue, BucketResult};
use crate::camera::Camera;
use crate::filter::{self, PostFilter};
use crate::scene::RenderScene;
use crate::shading::Tracer;

/// Summed color distance of the corner samples above which a pixel is refined.
const SUPERSAMPLE_THRESHOLD: f32 = 0.1;

/// Sub-pixel grid edge for depth-of-field sampling.
const LENS_GRID: u32 = 3;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load mesh: {0}")]
    Mesh(#[from] MeshError),

    #[error("shape {0} has a non-invertible transform")]
    DegenerateTransform(usize),

    #[error("output buffer holds {actual} pixels, image needs {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to start render workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Which materials spawn reflection rays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionGate {
    /// Reflect when the reflective color is non-zero.
    #[default]
    Reflective,
    /// Reflect only when the reflective color is exactly zero, so the
    /// recursion runs but contributes nothing. Kept for parity with scenes
    /// tuned against that behavior.
    NonReflectiveOnly,
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Use the scene BVH to pick intersection candidates
    pub acceleration: bool,
    /// Render tiles on a worker pool
    pub parallel: bool,
    /// Worker count; rayon's thread count when unset
    pub threads: Option<usize>,
    pub shadows: bool,
    /// Sample an area around point and spot lights
    pub soft_shadows: bool,
    pub reflection: bool,
    pub reflection_gate: ReflectionGate,
    pub refraction: bool,
    pub texture_mapping: bool,
    pub texture_filter: TextureFilter,
    /// Adaptive supersampling; takes precedence over depth of field
    pub supersampling: bool,
    pub depth_of_field: bool,
    /// Maximum recursion depth for reflection and refraction
    pub max_depth: u32,
    /// Output remapped world normals instead of radiance
    pub normals_only: bool,
    pub post_filter: PostFilter,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            acceleration: true,
            parallel: true,
            threads: None,
            shadows: true,
            soft_shadows: false,
            reflection: true,
            reflection_gate: ReflectionGate::default(),
            refraction: true,
            texture_mapping: true,
            texture_filter: TextureFilter::default(),
            supersampling: false,
            depth_of_field: false,
            max_depth: 4,
            normals_only: false,
            post_filter: PostFilter::default(),
        }
    }
}

/// Summary of a finished render.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub tiles: usize,
    pub primary_rays: u64,
    pub rays: u64,
    /// Deepest recursion level any ray reached
    pub deepest: u32,
    pub elapsed: Duration,
}

impl RenderStats {
    fn accumulate(&mut self, result: &BucketResult) {
        self.tiles += 1;
        self.primary_rays += result.primary_rays;
        self.rays += result.rays;
        self.deepest = self.deepest.max(result.deepest);
    }
}

/// Radiance for pixel `(i, j)` and the number of camera rays it took.
pub fn sample_pixel<R: Rng + ?Sized>(
    tracer: &Tracer<'_>,
    camera: &Camera,
    i: u32,
    j: u32,
    config: &RenderConfig,
    rng: &mut R,
) -> (Vec3, u32) {
    let (x, y) = (i as f32, j as f32);

    if config.supersampling {
        // Corners carry local illumination only
        let corners = [(x, y), (x + 1.0, y), (x, y + 1.0), (x + 1.0, y + 1.0)];
        let mut samples: Vec<Vec3> = corners
            .iter()
            .map(|&(sx, sy)| tracer.trace(&camera.ray(sx, sy), config.max_depth, rng))
            .collect();

        let avg = samples.iter().copied().sum::<Vec3>() / samples.len() as f32;
        let variance: f32 = samples.iter().map(|c| (*c - avg).length()).sum();

        if variance > SUPERSAMPLE_THRESHOLD {
            let refine = [
                (x + 0.5, y),
                (x, y + 0.5),
                (x + 0.5, y + 0.5),
                (x + 1.0, y + 0.5),
                (x + 0.5, y + 1.0),
            ];
            samples.extend(
                refine
                    .iter()
                    .map(|&(sx, sy)| tracer.trace(&camera.ray(sx, sy), 0, rng)),
            );
        }

        let count = samples.len() as u32;
        let sum: Vec3 = samples.into_iter().sum();
        return (sum / count as f32, count);
    }

    if config.depth_of_field && camera.has_lens() {
        let step = 1.0 / LENS_GRID as f32;
        let mut sum = Vec3::ZERO;
        for sx in 0..LENS_GRID {
            for sy in 0..LENS_GRID {
                let ray = camera.lens_ray(x + sx as f32 * step, y + sy as f32 * step, rng);
                sum += tracer.trace(&ray, 0, rng);
            }
        }
        let count = LENS_GRID * LENS_GRID;
        return (sum / count as f32, count);
    }

    (tracer.trace(&camera.ray(x, y), 0, rng), 1)
}

/// Render a prepared scene into `buffer` (row-major, `width * height` pixels).
///
/// The post filter, if any, runs once over the finished image.
pub fn render(
    buffer: &mut [Rgba],
    scene: &RenderScene,
    config: &RenderConfig,
) -> Result<RenderStats, RenderError> {
    let (width, height) = (scene.width(), scene.height());
    let expected = width as usize * height as usize;
    if buffer.len() != expected {
        return Err(RenderError::BufferSize {
            expected,
            actual: buffer.len(),
        });
    }

    if expected == 0 {
        log::warn!("Nothing to render for a {}x{} image", width, height);
        return Ok(RenderStats::default());
    }

    let start = Instant::now();
    let mut stats = if config.parallel {
        render_parallel(buffer, scene, config)?
    } else {
        let result = render_bucket(&Bucket::new(0, 0, width, height), scene, config);
        result.blit(buffer, width);
        let mut stats = RenderStats::default();
        stats.accumulate(&result);
        stats
    };

    filter::apply(buffer, width, height, config.post_filter);
    stats.elapsed = start.elapsed();

    info!(
        "Rendered {}x{} in {:.2?}: {} tiles, {} primary rays, {} rays, depth {}",
        width,
        height,
        stats.elapsed,
        stats.tiles,
        stats.primary_rays,
        stats.rays,
        stats.deepest
    );

    Ok(stats)
}

/// Fixed pool of workers draining the shared bucket queue.
fn render_parallel(
    buffer: &mut [Rgba],
    scene: &RenderScene,
    config: &RenderConfig,
) -> Result<RenderStats, RenderError> {
    let (width, height) = (scene.width(), scene.height());
    let workers = config.threads.unwrap_or_else(rayon::current_num_threads).max(1);
    let size = bucket_size(width, workers);
    let queue = BucketQueue::new(generate_buckets(width, height, size));

    log::debug!(
        "{} buckets of {}px on {} workers",
        queue.len(),
        size,
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let (tx, rx) = mpsc::channel::<BucketResult>();

    pool.scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            s.spawn(move |_| {
                while let Some(bucket) = queue.pop() {
                    if tx.send(render_bucket(&bucket, scene, config)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut stats = RenderStats::default();
    for result in rx {
        result.blit(buffer, width);
        stats.accumulate(&result);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{Light, Material, Primitive, Scene, Shape};
    use lumen_math::Mat4;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lit_sphere_scene() -> Scene {
        let mut scene = Scene::new("sphere");
        scene.add_shape(Shape::new(
            Primitive::Sphere,
            Mat4::from_scale(Vec3::splat(2.0)),
            Material::diffuse(Vec3::new(1.0, 0.5, 0.25)),
        ));
        scene.add_light(Light::directional(Vec3::ONE, Vec3::new(-1.0, -1.0, -1.0)));
        scene
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: RenderConfig = serde_json::from_str(
            r#"{
                "parallel": false,
                "max_depth": 2,
                "texture_filter": "bicubic",
                "reflection_gate": "non_reflective_only",
                "post_filter": { "median": { "kernel_size": 9 } }
            }"#,
        )
        .unwrap();

        assert!(!config.parallel);
        assert!(config.acceleration);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.texture_filter, TextureFilter::Bicubic);
        assert_eq!(config.reflection_gate, ReflectionGate::NonReflectiveOnly);
        assert_eq!(config.post_filter, PostFilter::Median { kernel_size: 9 });
    }

    #[test]
    fn test_buffer_size_checked() {
        let scene = RenderScene::from_scene(&lit_sphere_scene(), 8, 8).unwrap();
        let mut buffer = vec![Rgba::BLACK; 10];
        let err = render(&mut buffer, &scene, &RenderConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BufferSize {
                expected: 64,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_render_empty_image() {
        for (width, height) in [(0, 4), (4, 0), (0, 0)] {
            let scene = RenderScene::from_scene(&lit_sphere_scene(), width, height).unwrap();
            for parallel in [false, true] {
                let config = RenderConfig {
                    parallel,
                    ..Default::default()
                };
                let stats = render(&mut [], &scene, &config).unwrap();
                assert_eq!(stats.tiles, 0);
                assert_eq!(stats.rays, 0);
            }
        }
    }

    #[test]
    fn test_render_serial_stats() {
        let scene = RenderScene::from_scene(&lit_sphere_scene(), 16, 8).unwrap();
        let config = RenderConfig {
            parallel: false,
            ..Default::default()
        };
        let mut buffer = vec![Rgba::default(); 16 * 8];
        let stats = render(&mut buffer, &scene, &config).unwrap();

        assert_eq!(stats.tiles, 1);
        assert_eq!(stats.primary_rays, 16 * 8);
        assert!(buffer.iter().all(|p| p.a == 255));
        // The sphere fills the centre of the frame
        assert!(buffer[4 * 16 + 8].r > 0);
    }

    #[test]
    fn test_supersampling_flat_region_takes_four_samples() {
        // Nothing in view: every corner is background, so no refinement
        let scene = RenderScene::from_scene(&Scene::new("empty"), 4, 4).unwrap();
        let config = RenderConfig {
            supersampling: true,
            ..Default::default()
        };
        let tracer = Tracer::new(&scene, &config);
        let mut rng = StdRng::seed_from_u64(42);

        let (color, samples) = sample_pixel(&tracer, scene.camera(), 1, 1, &config, &mut rng);
        assert_eq!(samples, 4);
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn test_supersampling_refines_edges() {
        let scene = RenderScene::from_scene(&lit_sphere_scene(), 32, 32).unwrap();
        let config = RenderConfig {
            supersampling: true,
            ..Default::default()
        };
        let tracer = Tracer::new(&scene, &config);
        let mut rng = StdRng::seed_from_u64(42);

        // Some pixel along the sphere's silhouette must straddle the edge
        let refined = (0..32).any(|i| {
            let (_, samples) = sample_pixel(&tracer, scene.camera(), i, 16, &config, &mut rng);
            samples == 9
        });
        assert!(refined);
    }

    #[test]
    fn test_supersampling_recursion_schedule() {
        let mirror = Material {
            reflective: Vec3::ONE,
            ..Material::diffuse(Vec3::ONE)
        };

        // Facing mirrors; every camera ray keeps bouncing until the depth limit
        let mut desc = Scene::new("hall");
        desc.add_shape(Shape::new(
            Primitive::Cube,
            Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0))
                * Mat4::from_scale(Vec3::new(200.0, 200.0, 0.1)),
            mirror.clone(),
        ));
        desc.add_shape(Shape::new(
            Primitive::Cube,
            Mat4::from_translation(Vec3::new(0.0, 0.0, 8.0))
                * Mat4::from_scale(Vec3::new(200.0, 200.0, 0.1)),
            mirror,
        ));
        // Just above where one corner ray of pixel (0, 0) meets the front mirror,
        // so the corner shading differs enough to refine
        desc.add_light(Light::point(
            Vec3::ONE,
            Vec3::new(-1.065, 1.065, -2.45),
            Vec3::new(1.0, 0.0, 0.0),
        ));

        let scene = RenderScene::from_scene(&desc, 2, 2).unwrap();
        let config = RenderConfig {
            supersampling: true,
            max_depth: 3,
            ..Default::default()
        };
        let tracer = Tracer::new(&scene, &config);
        let mut rng = StdRng::seed_from_u64(42);

        let (_, samples) = sample_pixel(&tracer, scene.camera(), 0, 0, &config, &mut rng);
        assert_eq!(samples, 9);
        // Four corners with no bounces, five refinements with a full chain each
        assert_eq!(tracer.rays(), 4 + 5 * (config.max_depth as u64 + 1));
        assert_eq!(tracer.deepest(), config.max_depth);
    }

    #[test]
    fn test_depth_of_field_samples() {
        let mut desc = lit_sphere_scene();
        desc.camera.aperture = 0.2;
        desc.camera.focal_length = 5.0;
        let scene = RenderScene::from_scene(&desc, 8, 8).unwrap();
        let config = RenderConfig {
            depth_of_field: true,
            ..Default::default()
        };
        let tracer = Tracer::new(&scene, &config);
        let mut rng = StdRng::seed_from_u64(42);

        let (_, samples) = sample_pixel(&tracer, scene.camera(), 4, 4, &config, &mut rng);
        assert_eq!(samples, 9);
    }
}
