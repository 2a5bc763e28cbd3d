//! Lumen Core - Scene model and asset loading for the Lumen ray tracer.
//!
//! This crate provides:
//!
//! - **Scene model**: `Scene`, `Shape`, `Material`, `Light`, `CameraDesc`
//! - **Assets**: OBJ meshes (`Mesh`, `MeshCache`) and textures (`Texture`, `TextureCache`)
//! - **Scene files**: JSON scene loading via `load_scene`
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::load_scene;
//!
//! let scene = load_scene("scenes/spheres.json")?;
//! println!("Loaded {} shapes, {} lights", scene.shape_count(), scene.light_count());
//! ```

pub mod loader;
pub mod mesh;
pub mod pixel;
pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use loader::{load_scene, load_scene_from_str, SceneError};
pub use mesh::{Face, Mesh, MeshCache, MeshError};
pub use pixel::Rgba;
pub use scene::{
    CameraDesc, GlobalCoefficients, Light, LightKind, Material, Primitive, Scene, Shape,
    TextureMap, Transform,
};
pub use texture::{Texture, TextureCache, TextureError, TextureFilter};
