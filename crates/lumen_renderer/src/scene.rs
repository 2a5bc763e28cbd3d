//! Scene prepared for tracing.
//!
//! Preparation resolves every mesh and texture through the caches, builds
//! per-mesh and scene-level BVHs, and caches each shape's inverse and
//! normal matrices. The result is immutable and shared read-only by all
//! tile workers.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use lumen_core::{
    GlobalCoefficients, Light, Material, MeshCache, Primitive, Scene, Texture, TextureCache,
    TextureFilter,
};
use lumen_math::{Aabb, Mat3, Mat4, Mat4Ext, Ray, Vec3};

use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::hittable::{HitRecord, Hittable, LocalHit, T_MIN};
use crate::primitive::{Cone, Cube, Cylinder, Geometry, MeshGeometry, Sphere};
use crate::renderer::RenderError;

/// One shape with its geometry, material and cached transforms.
#[derive(Debug)]
pub struct RenderShape {
    geometry: Geometry,
    material: Material,
    texture: Option<Arc<Texture>>,
    transform: Mat4,
    inverse: Mat4,
    normal_matrix: Mat3,
    bounds: Aabb,
}

impl RenderShape {
    /// Returns `None` when the transform cannot be inverted.
    pub fn new(
        geometry: Geometry,
        material: Material,
        texture: Option<Arc<Texture>>,
        transform: Mat4,
    ) -> Option<Self> {
        let det = transform.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let bounds = transform.transform_aabb(&geometry.bounding_box());
        Some(Self {
            geometry,
            material,
            texture,
            inverse: transform.inverse(),
            normal_matrix: transform.normal_matrix(),
            transform,
            bounds,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// World-space box: the object box's eight corners, transformed.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Nearest hit of a world ray. The object-space ray keeps the world
    /// parameterisation, so `t` is valid in both spaces.
    pub fn intersect(&self, ray: &Ray) -> Option<LocalHit> {
        self.geometry.hit(&ray.transformed(&self.inverse))
    }

    /// Exit point of a world ray travelling inside the solid.
    pub fn intersect_inside(&self, ray: &Ray) -> Option<LocalHit> {
        self.geometry.hit_inside(&ray.transformed(&self.inverse))
    }

    /// Object-space normal to a unit world-space normal.
    pub fn normal_to_world(&self, normal: Vec3) -> Vec3 {
        (self.normal_matrix * normal).normalize_or_zero()
    }

    /// Texture color at a world-space surface point, if the shape is
    /// textured, the primitive has UVs, and the image decoded.
    pub fn texture_color(&self, p: Vec3, filter: TextureFilter) -> Option<Vec3> {
        let map = self.material.texture.as_ref()?;
        let texture = self.texture.as_ref()?;
        let (u, v) = self.geometry.uv(self.inverse.transform_point3(p))?;
        let (u, v) = map.tile(u, v);
        texture.sample(u, v, filter)
    }
}

/// Immutable render-ready scene.
#[derive(Debug)]
pub struct RenderScene {
    shapes: Vec<RenderShape>,
    lights: Vec<Light>,
    globals: GlobalCoefficients,
    camera: Camera,
    bvh: Bvh,
    width: u32,
    height: u32,
}

impl RenderScene {
    /// Resolve assets and build acceleration structures for an image size.
    ///
    /// Meshes that fail to load abort preparation; textures that fail to
    /// decode leave their shapes untextured.
    pub fn prepare(
        scene: &Scene,
        width: u32,
        height: u32,
        meshes: &mut MeshCache,
        textures: &mut TextureCache,
    ) -> Result<Self, RenderError> {
        let mut mesh_geometry: HashMap<String, Arc<MeshGeometry>> = HashMap::new();
        let mut shapes = Vec::with_capacity(scene.shapes.len());

        for (index, shape) in scene.shapes.iter().enumerate() {
            let geometry = match &shape.primitive {
                Primitive::Sphere => Geometry::Sphere(Sphere),
                Primitive::Cube => Geometry::Cube(Cube),
                Primitive::Cylinder => Geometry::Cylinder(Cylinder),
                Primitive::Cone => Geometry::Cone(Cone),
                Primitive::Mesh { file } => {
                    let geometry = match mesh_geometry.get(file) {
                        Some(g) => Arc::clone(g),
                        None => {
                            let mesh = meshes.load(file)?;
                            let g = Arc::new(MeshGeometry::new(mesh));
                            mesh_geometry.insert(file.clone(), Arc::clone(&g));
                            g
                        }
                    };
                    Geometry::Mesh(geometry)
                }
            };

            let texture = shape
                .material
                .texture
                .as_ref()
                .map(|map| textures.load_or_empty(&map.path));

            let render_shape =
                RenderShape::new(geometry, shape.material.clone(), texture, shape.transform)
                    .ok_or(RenderError::DegenerateTransform(index))?;
            shapes.push(render_shape);
        }

        let bvh = Bvh::build(&shapes, RenderShape::bounds);
        info!(
            "Prepared scene '{}': {} shapes ({} meshes), {} lights, BVH {} nodes, depth {}",
            scene.name,
            shapes.len(),
            mesh_geometry.len(),
            scene.lights.len(),
            bvh.node_count(),
            bvh.depth()
        );
        debug!(
            "Asset caches: {} meshes, {} textures ({} bytes)",
            meshes.len(),
            textures.len(),
            textures.total_size_bytes()
        );

        Ok(Self {
            shapes,
            lights: scene.lights.clone(),
            globals: scene.globals,
            camera: Camera::new(&scene.camera, width, height),
            bvh,
            width,
            height,
        })
    }

    /// [`RenderScene::prepare`] with fresh caches.
    pub fn from_scene(scene: &Scene, width: u32, height: u32) -> Result<Self, RenderError> {
        Self::prepare(
            scene,
            width,
            height,
            &mut MeshCache::new(),
            &mut TextureCache::new(),
        )
    }

    pub fn shapes(&self) -> &[RenderShape] {
        &self.shapes
    }

    pub fn shape(&self, index: usize) -> &RenderShape {
        &self.shapes[index]
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn globals(&self) -> &GlobalCoefficients {
        &self.globals
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Visit the shapes a ray may hit: BVH candidates, or every shape.
    fn for_each_candidate<F: FnMut(usize)>(&self, ray: &Ray, accelerate: bool, mut f: F) {
        if accelerate {
            self.bvh.for_each_candidate(ray, f);
        } else {
            (0..self.shapes.len()).for_each(&mut f);
        }
    }

    /// Globally nearest hit, with the normal in world space.
    pub fn intersect(&self, ray: &Ray, accelerate: bool) -> Option<HitRecord> {
        let mut best: Option<(usize, LocalHit)> = None;
        self.for_each_candidate(ray, accelerate, |index| {
            if let Some(hit) = self.shapes[index].intersect(ray) {
                if best.map_or(true, |(_, b)| hit.t < b.t) {
                    best = Some((index, hit));
                }
            }
        });

        best.map(|(index, hit)| HitRecord {
            t: hit.t,
            p: ray.at(hit.t),
            normal: self.shapes[index].normal_to_world(hit.normal),
            shape: index,
        })
    }

    /// True if any shape blocks the ray with `T_MIN < t < max_t`.
    pub fn occluded(&self, ray: &Ray, max_t: f32, accelerate: bool) -> bool {
        let mut blocked = false;
        self.for_each_candidate(ray, accelerate, |index| {
            if blocked {
                return;
            }
            if let Some(hit) = self.shapes[index].intersect(ray) {
                blocked = hit.t > T_MIN && hit.t < max_t;
            }
        });
        blocked
    }
}
