//! JSON scene files.
//!
//! A scene file is decoded into plain description structs with serde and
//! then converted into the [`Scene`] model. Angles are authored in
//! degrees; mesh and texture paths are relative to the scene file.
//!
//! ```json
//! {
//!   "camera": { "position": [0, 0, 5], "look": [0, 0, -1], "up": [0, 1, 0], "height_angle": 30 },
//!   "globals": { "ka": 0.5, "kd": 0.5, "ks": 0.5, "kt": 0.5 },
//!   "lights": [ { "type": "directional", "color": [1, 1, 1], "direction": [0, -1, -1] } ],
//!   "shapes": [
//!     { "primitive": "sphere", "translate": [0, 0, 0], "material": { "diffuse": [1, 0, 0] } },
//!     { "primitive": "mesh", "file": "bunny.obj", "scale": [2, 2, 2] }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use lumen_math::{Quat, Vec3};
use serde::Deserialize;
use thiserror::Error;

use crate::scene::{
    CameraDesc, GlobalCoefficients, Light, Material, Primitive, Scene, Shape, TextureMap,
    Transform,
};

/// Errors that can occur while loading a scene file.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Failed to read scene {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scene: {0}")]
    Invalid(String),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Load a scene from a JSON file.
pub fn load_scene(path: impl AsRef<Path>) -> SceneResult<Scene> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let scene = load_scene_from_str(&text, base_dir, name)?;
    log::info!(
        "Loaded scene '{}': {} shapes, {} lights",
        scene.name,
        scene.shape_count(),
        scene.light_count()
    );
    Ok(scene)
}

/// Parse scene JSON, resolving relative asset paths against `base_dir`.
pub fn load_scene_from_str(
    text: &str,
    base_dir: &Path,
    name: impl Into<String>,
) -> SceneResult<Scene> {
    let desc: SceneDesc = serde_json::from_str(text)?;
    desc.into_scene(base_dir, name.into())
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct SceneDesc {
    camera: CameraFile,
    globals: GlobalsFile,
    lights: Vec<LightFile>,
    shapes: Vec<ShapeFile>,
}

#[derive(Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
struct CameraFile {
    position: [f32; 3],
    look: [f32; 3],
    up: [f32; 3],
    /// Degrees
    height_angle: f32,
    aperture: f32,
    focal_length: f32,
}

impl Default for CameraFile {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 5.0],
            look: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            height_angle: 30.0,
            aperture: 0.0,
            focal_length: 5.0,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
struct GlobalsFile {
    ka: f32,
    kd: f32,
    ks: f32,
    kt: f32,
}

impl Default for GlobalsFile {
    fn default() -> Self {
        let g = GlobalCoefficients::default();
        Self {
            ka: g.ka,
            kd: g.kd,
            ks: g.ks,
            kt: g.kt,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum LightType {
    Directional,
    Point,
    Spot,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct LightFile {
    #[serde(rename = "type")]
    kind: LightType,
    #[serde(default = "white")]
    color: [f32; 3],
    #[serde(default)]
    position: [f32; 3],
    #[serde(default)]
    direction: [f32; 3],
    #[serde(default = "no_falloff")]
    attenuation: [f32; 3],
    /// Degrees
    #[serde(default)]
    angle: f32,
    /// Degrees
    #[serde(default)]
    penumbra: f32,
}

fn white() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn no_falloff() -> [f32; 3] {
    [1.0, 0.0, 0.0]
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum PrimitiveType {
    Cube,
    Sphere,
    Cylinder,
    Cone,
    Mesh,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ShapeFile {
    primitive: PrimitiveType,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    translate: [f32; 3],
    #[serde(default)]
    rotate: Option<RotateFile>,
    #[serde(default = "unit_scale")]
    scale: [f32; 3],
    #[serde(default)]
    material: MaterialFile,
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RotateFile {
    axis: [f32; 3],
    /// Degrees
    angle: f32,
}

#[derive(Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
struct MaterialFile {
    ambient: [f32; 3],
    diffuse: [f32; 3],
    specular: [f32; 3],
    reflective: [f32; 3],
    transparent: [f32; 3],
    shininess: f32,
    ior: f32,
    blend: f32,
    texture: Option<TextureFile>,
}

impl Default for MaterialFile {
    fn default() -> Self {
        let m = Material::default();
        Self {
            ambient: m.ambient.to_array(),
            diffuse: m.diffuse.to_array(),
            specular: m.specular.to_array(),
            reflective: m.reflective.to_array(),
            transparent: m.transparent.to_array(),
            shininess: m.shininess,
            ior: m.ior,
            blend: m.blend,
            texture: None,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TextureFile {
    file: String,
    #[serde(default = "one")]
    repeat_u: f32,
    #[serde(default = "one")]
    repeat_v: f32,
}

fn one() -> f32 {
    1.0
}

impl SceneDesc {
    fn into_scene(self, base_dir: &Path, name: String) -> SceneResult<Scene> {
        let mut scene = Scene::new(name);

        let look = Vec3::from(self.camera.look);
        let up = Vec3::from(self.camera.up);
        if look.length_squared() == 0.0 || look.cross(up).length_squared() == 0.0 {
            return Err(SceneError::Invalid(
                "camera look and up must be non-zero and not parallel".to_string(),
            ));
        }
        scene.camera = CameraDesc {
            position: Vec3::from(self.camera.position),
            look,
            up,
            height_angle: self.camera.height_angle.to_radians(),
            aperture: self.camera.aperture,
            focal_length: self.camera.focal_length,
        };

        scene.globals = GlobalCoefficients {
            ka: self.globals.ka,
            kd: self.globals.kd,
            ks: self.globals.ks,
            kt: self.globals.kt,
        };

        for (i, light) in self.lights.into_iter().enumerate() {
            scene.add_light(convert_light(i, light)?);
        }

        for (i, shape) in self.shapes.into_iter().enumerate() {
            scene.add_shape(convert_shape(i, shape, base_dir)?);
        }

        Ok(scene)
    }
}

fn convert_light(index: usize, light: LightFile) -> SceneResult<Light> {
    let color = Vec3::from(light.color);
    let position = Vec3::from(light.position);
    let direction = Vec3::from(light.direction);
    let attenuation = Vec3::from(light.attenuation);

    if light.kind != LightType::Point && direction.length_squared() == 0.0 {
        return Err(SceneError::Invalid(format!(
            "light {} needs a non-zero direction",
            index
        )));
    }

    Ok(match light.kind {
        LightType::Directional => Light::directional(color, direction),
        LightType::Point => Light::point(color, position, attenuation),
        LightType::Spot => {
            if light.penumbra > light.angle {
                return Err(SceneError::Invalid(format!(
                    "spot light {} has penumbra {} wider than its angle {}",
                    index, light.penumbra, light.angle
                )));
            }
            Light::spot(
                color,
                position,
                direction,
                attenuation,
                light.angle.to_radians(),
                light.penumbra.to_radians(),
            )
        }
    })
}

fn convert_shape(index: usize, shape: ShapeFile, base_dir: &Path) -> SceneResult<Shape> {
    if shape.primitive != PrimitiveType::Mesh {
        if let Some(file) = &shape.file {
            log::warn!("Shape {}: ignoring file '{}' on a non-mesh primitive", index, file);
        }
    }

    let primitive = match shape.primitive {
        PrimitiveType::Cube => Primitive::Cube,
        PrimitiveType::Sphere => Primitive::Sphere,
        PrimitiveType::Cylinder => Primitive::Cylinder,
        PrimitiveType::Cone => Primitive::Cone,
        PrimitiveType::Mesh => match &shape.file {
            Some(file) => Primitive::Mesh {
                file: resolve(base_dir, file),
            },
            None => {
                return Err(SceneError::Invalid(format!(
                    "shape {} is a mesh without a file",
                    index
                )))
            }
        },
    };

    let rotation = match shape.rotate {
        Some(r) => {
            let axis = Vec3::from(r.axis);
            if axis.length_squared() == 0.0 {
                return Err(SceneError::Invalid(format!(
                    "shape {} has a zero rotation axis",
                    index
                )));
            }
            Quat::from_axis_angle(axis.normalize(), r.angle.to_radians())
        }
        None => Quat::IDENTITY,
    };

    let transform = Transform {
        translation: Vec3::from(shape.translate),
        rotation,
        scale: Vec3::from(shape.scale),
    };
    if transform.to_matrix().determinant().abs() < 1e-12 {
        return Err(SceneError::Invalid(format!(
            "shape {} has a degenerate transform",
            index
        )));
    }

    let m = shape.material;
    if m.ior <= 0.0 {
        return Err(SceneError::Invalid(format!(
            "shape {} has non-positive index of refraction {}",
            index, m.ior
        )));
    }

    let material = Material {
        ambient: Vec3::from(m.ambient),
        diffuse: Vec3::from(m.diffuse),
        specular: Vec3::from(m.specular),
        reflective: Vec3::from(m.reflective),
        transparent: Vec3::from(m.transparent),
        shininess: m.shininess,
        ior: m.ior,
        blend: m.blend.clamp(0.0, 1.0),
        texture: m.texture.map(|t| TextureMap {
            path: resolve(base_dir, &t.file),
            repeat_u: t.repeat_u,
            repeat_v: t.repeat_v,
        }),
    };

    Ok(Shape::new(primitive, transform.to_matrix(), material))
}

fn resolve(base_dir: &Path, file: &str) -> String {
    let path = Path::new(file);
    let full: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    full.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::LightKind;

    fn parse(text: &str) -> SceneResult<Scene> {
        load_scene_from_str(text, Path::new("/scenes"), "test")
    }

    #[test]
    fn test_empty_scene_uses_defaults() {
        let scene = parse("{}").unwrap();
        assert_eq!(scene.shape_count(), 0);
        assert_eq!(scene.light_count(), 0);
        assert_eq!(scene.globals, GlobalCoefficients::default());
        assert!((scene.camera.height_angle - 30f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_full_scene() {
        let text = r#"{
            "camera": { "position": [0, 1, 6], "look": [0, 0, -1], "up": [0, 1, 0],
                        "height_angle": 45, "aperture": 0.1, "focal_length": 6 },
            "globals": { "ka": 0.2, "kd": 0.8, "ks": 0.3, "kt": 0.9 },
            "lights": [
                { "type": "directional", "color": [1, 1, 1], "direction": [0, -1, 0] },
                { "type": "point", "position": [0, 4, 0], "attenuation": [1, 0.1, 0] },
                { "type": "spot", "position": [0, 4, 0], "direction": [0, -1, 0],
                  "angle": 30, "penumbra": 5 }
            ],
            "shapes": [
                { "primitive": "sphere", "translate": [1, 0, 0],
                  "material": { "diffuse": [1, 0, 0], "shininess": 20,
                                "texture": { "file": "wood.png", "repeat_u": 2 } } },
                { "primitive": "mesh", "file": "models/bunny.obj",
                  "rotate": { "axis": [0, 1, 0], "angle": 90 }, "scale": [2, 2, 2] }
            ]
        }"#;

        let scene = parse(text).unwrap();
        assert_eq!(scene.light_count(), 3);
        assert_eq!(scene.shape_count(), 2);
        assert!((scene.camera.height_angle - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!((scene.globals.kt - 0.9).abs() < 1e-6);

        assert_eq!(scene.lights[1].kind, LightKind::Point);
        assert!((scene.lights[1].attenuation.y - 0.1).abs() < 1e-6);
        assert!((scene.lights[2].angle - 30f32.to_radians()).abs() < 1e-6);

        let sphere = &scene.shapes[0];
        assert_eq!(sphere.primitive, Primitive::Sphere);
        let texture = sphere.material.texture.as_ref().unwrap();
        assert_eq!(Path::new(&texture.path), Path::new("/scenes/wood.png"));
        assert_eq!(texture.repeat_u, 2.0);
        assert_eq!(texture.repeat_v, 1.0);

        match &scene.shapes[1].primitive {
            Primitive::Mesh { file } => {
                assert_eq!(Path::new(file), Path::new("/scenes/models/bunny.obj"))
            }
            other => panic!("expected mesh, got {:?}", other),
        }
        let p = scene.shapes[1].transform.transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 0.0, -2.0)).length() < 0.001);
    }

    #[test]
    fn test_mesh_without_file_fails() {
        let result = parse(r#"{ "shapes": [ { "primitive": "mesh" } ] }"#);
        assert!(matches!(result, Err(SceneError::Invalid(_))));
    }

    #[test]
    fn test_unknown_field_fails() {
        let result = parse(r#"{ "shapes": [ { "primitive": "sphere", "colour": [1, 0, 0] } ] }"#);
        assert!(matches!(result, Err(SceneError::Json(_))));
    }

    #[test]
    fn test_unknown_primitive_fails() {
        let result = parse(r#"{ "shapes": [ { "primitive": "torus" } ] }"#);
        assert!(matches!(result, Err(SceneError::Json(_))));
    }

    #[test]
    fn test_bad_ior_fails() {
        let result = parse(r#"{ "shapes": [ { "primitive": "cube", "material": { "ior": 0 } } ] }"#);
        assert!(matches!(result, Err(SceneError::Invalid(_))));
    }

    #[test]
    fn test_degenerate_scale_fails() {
        let result = parse(r#"{ "shapes": [ { "primitive": "cube", "scale": [1, 0, 1] } ] }"#);
        assert!(matches!(result, Err(SceneError::Invalid(_))));
    }

    #[test]
    fn test_wide_penumbra_fails() {
        let result = parse(
            r#"{ "lights": [ { "type": "spot", "direction": [0, -1, 0], "angle": 10, "penumbra": 20 } ] }"#,
        );
        assert!(matches!(result, Err(SceneError::Invalid(_))));
    }

    #[test]
    fn test_load_scene_missing_file() {
        let result = load_scene("/definitely/not/here.json");
        assert!(matches!(result, Err(SceneError::Io { .. })));
    }
}
