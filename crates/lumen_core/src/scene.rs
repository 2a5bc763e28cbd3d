//! Scene model for Lumen.
//!
//! This module defines the renderer-agnostic description of a scene:
//! shapes with their transforms and materials, lights, the camera, and
//! the global illumination coefficients. Nothing here knows about rays.

use lumen_math::{Mat4, Quat, Vec3};

/// The geometric kind of a shape.
///
/// All analytic primitives live in the unit box `[-0.5, 0.5]^3` of their
/// own object space. Meshes reference an OBJ file.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Cube,
    Sphere,
    Cylinder,
    Cone,
    Mesh { file: String },
}

impl Primitive {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Cube => "cube",
            Primitive::Sphere => "sphere",
            Primitive::Cylinder => "cylinder",
            Primitive::Cone => "cone",
            Primitive::Mesh { .. } => "mesh",
        }
    }
}

/// A texture applied to a material's diffuse term.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMap {
    /// Image file path (resolved against the scene directory by the loader)
    pub path: String,

    /// Number of repeats across the U range
    pub repeat_u: f32,

    /// Number of repeats across the V range
    pub repeat_v: f32,
}

impl TextureMap {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            repeat_u: 1.0,
            repeat_v: 1.0,
        }
    }

    /// Tile a primitive UV by the repeat factors, keeping the fractional part.
    pub fn tile(&self, u: f32, v: f32) -> (f32, f32) {
        (tile_axis(u, self.repeat_u), tile_axis(v, self.repeat_v))
    }
}

fn tile_axis(value: f32, repeat: f32) -> f32 {
    let scaled = value * repeat;
    scaled - scaled.trunc()
}

/// Phong material with mirror and transmission colors.
///
/// Colors are RGB in [0, 1]; the global coefficients in
/// [`GlobalCoefficients`] scale each term at shading time.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub reflective: Vec3,
    pub transparent: Vec3,

    /// Specular exponent
    pub shininess: f32,

    /// Index of refraction of the solid's interior
    pub ior: f32,

    /// Weight of the texture color against `kd * diffuse` (0 = no texture)
    pub blend: f32,

    pub texture: Option<TextureMap>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            diffuse: Vec3::splat(0.5),
            specular: Vec3::ZERO,
            reflective: Vec3::ZERO,
            transparent: Vec3::ZERO,
            shininess: 1.0,
            ior: 1.0,
            blend: 0.0,
            texture: None,
        }
    }
}

impl Material {
    /// Create a plain diffuse material.
    pub fn diffuse(color: Vec3) -> Self {
        Self {
            diffuse: color,
            ..Default::default()
        }
    }

    pub fn is_reflective(&self) -> bool {
        self.reflective.length_squared() > 0.0
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent.length_squared() > 0.0
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as quaternion)
    pub rotation: Quat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// One object of the scene: geometry, placement, and appearance.
#[derive(Clone, Debug)]
pub struct Shape {
    pub primitive: Primitive,

    /// Object-to-world transform
    pub transform: Mat4,

    pub material: Material,
}

impl Shape {
    pub fn new(primitive: Primitive, transform: Mat4, material: Material) -> Self {
        Self {
            primitive,
            transform,
            material,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// A light source.
///
/// Directional lights use only `direction`; point lights use `position` and
/// `attenuation`; spot lights use all fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub position: Vec3,
    pub direction: Vec3,

    /// Constant, linear, and quadratic falloff coefficients
    pub attenuation: Vec3,

    /// Spot cone half-angle in radians
    pub angle: f32,

    /// Spot penumbra width in radians
    pub penumbra: f32,
}

impl Light {
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            position: Vec3::ZERO,
            direction,
            attenuation: Vec3::X,
            angle: 0.0,
            penumbra: 0.0,
        }
    }

    pub fn point(color: Vec3, position: Vec3, attenuation: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            position,
            direction: Vec3::ZERO,
            attenuation,
            angle: 0.0,
            penumbra: 0.0,
        }
    }

    pub fn spot(
        color: Vec3,
        position: Vec3,
        direction: Vec3,
        attenuation: Vec3,
        angle: f32,
        penumbra: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            color,
            position,
            direction,
            attenuation,
            angle,
            penumbra,
        }
    }
}

/// Camera parameters as authored in the scene file.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraDesc {
    pub position: Vec3,
    pub look: Vec3,
    pub up: Vec3,

    /// Vertical field of view in radians
    pub height_angle: f32,

    /// Lens diameter for depth of field
    pub aperture: f32,

    /// Distance to the plane of perfect focus
    pub focal_length: f32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            look: Vec3::NEG_Z,
            up: Vec3::Y,
            height_angle: 30f32.to_radians(),
            aperture: 0.0,
            focal_length: 5.0,
        }
    }
}

/// Scene-wide weights for the ambient, diffuse, specular, and transmitted terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalCoefficients {
    pub ka: f32,
    pub kd: f32,
    pub ks: f32,
    pub kt: f32,
}

impl Default for GlobalCoefficients {
    fn default() -> Self {
        Self {
            ka: 0.5,
            kd: 0.5,
            ks: 0.5,
            kt: 0.0,
        }
    }
}

/// A complete scene ready to be prepared for rendering.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,

    pub shapes: Vec<Shape>,
    pub lights: Vec<Light>,
    pub camera: CameraDesc,
    pub globals: GlobalCoefficients,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a shape and return its index.
    pub fn add_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_creation() {
        let mut scene = Scene::new("test");

        let id = scene.add_shape(Shape::new(
            Primitive::Sphere,
            Mat4::IDENTITY,
            Material::default(),
        ));
        assert_eq!(id, 0);

        scene.add_shape(Shape::new(
            Primitive::Mesh {
                file: "bunny.obj".to_string(),
            },
            Mat4::IDENTITY,
            Material::default(),
        ));
        scene.add_shape(Shape::new(
            Primitive::Mesh {
                file: "bunny.obj".to_string(),
            },
            Mat4::from_translation(Vec3::X),
            Material::default(),
        ));
        scene.add_light(Light::directional(Vec3::ONE, Vec3::NEG_Y));

        assert_eq!(scene.shape_count(), 3);
        assert_eq!(scene.light_count(), 1);
    }

    #[test]
    fn test_transform_to_matrix() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        // Scale first, then rotate +X onto -Z, then translate
        let p = transform.to_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 0.001);
    }

    #[test]
    fn test_texture_map_tile() {
        let map = TextureMap {
            path: "checker.png".to_string(),
            repeat_u: 3.0,
            repeat_v: 1.0,
        };

        let (u, v) = map.tile(0.5, 0.25);
        assert!((u - 0.5).abs() < 0.001);
        assert!((v - 0.25).abs() < 0.001);

        let (u, _) = map.tile(0.9, 0.0);
        assert!((u - 0.7).abs() < 0.001);
    }

    #[test]
    fn test_material_flags() {
        let mut material = Material::diffuse(Vec3::new(1.0, 0.0, 0.0));
        assert!(!material.is_reflective());
        assert!(!material.is_transparent());

        material.reflective = Vec3::splat(0.2);
        material.transparent = Vec3::new(0.0, 0.0, 0.1);
        assert!(material.is_reflective());
        assert!(material.is_transparent());
    }
}
