//! Triangle mesh geometry and OBJ loading.
//!
//! Meshes are loaded once per file and shared read-only through
//! [`MeshCache`]. Faces keep separate position and normal index streams,
//! as in the OBJ file, so hard edges survive loading.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use lumen_math::{Aabb, Vec3};
use thiserror::Error;

/// Errors that can occur while loading a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Failed to open mesh {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse OBJ {path}: {source}")]
    Parse {
        path: String,
        source: tobj::LoadError,
    },

    #[error("Face {face} references {kind} index {index}, but only {count} exist")]
    IndexOutOfRange {
        face: usize,
        kind: &'static str,
        index: u32,
        count: usize,
    },

    #[error("Mesh {0} contains no triangles")]
    Empty(String),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// One triangle: three 0-based position indices and, when the file
/// provides them, three 0-based normal indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub vertices: [u32; 3],
    pub normals: Option<[u32; 3]>,
}

impl Face {
    pub fn new(vertices: [u32; 3]) -> Self {
        Self {
            vertices,
            normals: None,
        }
    }

    pub fn with_normals(vertices: [u32; 3], normals: [u32; 3]) -> Self {
        Self {
            vertices,
            normals: Some(normals),
        }
    }
}

/// A triangle mesh with vertex positions, vertex normals, and faces.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals, addressed by `Face::normals`
    pub normals: Vec<Vec3>,

    pub faces: Vec<Face>,

    /// Axis-aligned bounding box of all positions
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a mesh, checking that every face index is in range.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, faces: Vec<Face>) -> MeshResult<Self> {
        for (i, face) in faces.iter().enumerate() {
            check_indices(i, "vertex", &face.vertices, positions.len())?;
            if let Some(n) = &face.normals {
                check_indices(i, "normal", n, normals.len())?;
            }
        }

        let bounds = Aabb::enclosing(positions.iter().copied());
        Ok(Self {
            positions,
            normals,
            faces,
            bounds,
        })
    }

    /// Load a Wavefront OBJ file.
    ///
    /// All objects in the file are merged into one mesh. Polygons are
    /// triangulated; materials are ignored.
    pub fn load_obj(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|source| MeshError::Open {
            path: label.clone(),
            source,
        })?;
        Self::from_obj_reader(&mut BufReader::new(file), &label)
    }

    /// Parse OBJ text from any buffered reader. `label` names the source in errors.
    pub fn from_obj_reader<R: BufRead>(reader: &mut R, label: &str) -> MeshResult<Self> {
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        };

        let (models, _materials) =
            tobj::load_obj_buf(reader, &options, |_| Err(tobj::LoadError::OpenFileFailed))
                .map_err(|source| MeshError::Parse {
                    path: label.to_string(),
                    source,
                })?;

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut faces = Vec::new();

        for model in &models {
            let mesh = &model.mesh;
            let position_offset = positions.len() as u32;
            let normal_offset = normals.len() as u32;

            positions.extend(
                mesh.positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2])),
            );
            normals.extend(
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2])),
            );

            // Normal indices are only usable when every corner has one
            let has_normals = mesh.normal_indices.len() == mesh.indices.len();
            if !mesh.normal_indices.is_empty() && !has_normals {
                log::warn!(
                    "{}: object '{}' has partial vertex normals, using face normals",
                    label,
                    model.name
                );
            }

            for (corner, tri) in mesh.indices.chunks_exact(3).enumerate() {
                let vertices = [
                    tri[0] + position_offset,
                    tri[1] + position_offset,
                    tri[2] + position_offset,
                ];
                let face = if has_normals {
                    let n = &mesh.normal_indices[corner * 3..corner * 3 + 3];
                    Face::with_normals(
                        vertices,
                        [
                            n[0] + normal_offset,
                            n[1] + normal_offset,
                            n[2] + normal_offset,
                        ],
                    )
                } else {
                    Face::new(vertices)
                };
                faces.push(face);
            }
        }

        if faces.is_empty() {
            return Err(MeshError::Empty(label.to_string()));
        }

        let mesh = Self::new(positions, normals, faces)?;
        log::debug!(
            "Loaded mesh {}: {} vertices, {} normals, {} triangles",
            label,
            mesh.vertex_count(),
            mesh.normals.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// True when every face carries vertex normals (smooth shading).
    pub fn has_normals(&self) -> bool {
        !self.faces.is_empty() && self.faces.iter().all(|f| f.normals.is_some())
    }

    /// Corner positions of face `index`.
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.faces[index].vertices;
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Corner normals of face `index`, if the face has them.
    pub fn triangle_normals(&self, index: usize) -> Option<[Vec3; 3]> {
        self.faces[index].normals.map(|[a, b, c]| {
            [
                self.normals[a as usize],
                self.normals[b as usize],
                self.normals[c as usize],
            ]
        })
    }
}

fn check_indices(face: usize, kind: &'static str, indices: &[u32; 3], count: usize) -> MeshResult<()> {
    match indices.iter().find(|&&i| i as usize >= count) {
        Some(&index) => Err(MeshError::IndexOutOfRange {
            face,
            kind,
            index,
            count,
        }),
        None => Ok(()),
    }
}

/// Cache of loaded meshes keyed by file path.
///
/// Filled during scene preparation, before any worker thread exists, and
/// only read afterward.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<String, Arc<Mesh>>,
}

impl MeshCache {
    /// Create a new empty mesh cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mesh from file, using cache if available.
    pub fn load(&mut self, path: &str) -> MeshResult<Arc<Mesh>> {
        if let Some(mesh) = self.meshes.get(path) {
            return Ok(mesh.clone());
        }

        let mesh = Arc::new(Mesh::load_obj(path)?);
        self.meshes.insert(path.to_string(), mesh.clone());
        Ok(mesh)
    }

    /// Insert an already-built mesh under a key.
    pub fn insert(&mut self, path: impl Into<String>, mesh: Mesh) -> Arc<Mesh> {
        let mesh = Arc::new(mesh);
        self.meshes.insert(path.into(), mesh.clone());
        mesh
    }

    /// Get a cached mesh without loading.
    pub fn get(&self, path: &str) -> Option<Arc<Mesh>> {
        self.meshes.get(path).cloned()
    }

    /// Get the number of cached meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
# unit quad in the xy plane
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    fn parse(text: &str) -> MeshResult<Mesh> {
        Mesh::from_obj_reader(&mut Cursor::new(text), "test.obj")
    }

    #[test]
    fn test_mesh_creation() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = Mesh::new(positions, Vec::new(), vec![Face::new([0, 1, 2])]).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
        assert_eq!(mesh.triangle(0)[1], Vec3::X);
    }

    #[test]
    fn test_bounds_computation() {
        let positions = vec![
            Vec3::new(-1.0, -2.0, -3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let mesh = Mesh::new(positions, Vec::new(), vec![Face::new([0, 1, 2])]).unwrap();

        assert!((mesh.bounds.min - Vec3::new(-1.0, -2.0, -3.0)).length() < 0.001);
        assert!((mesh.bounds.max - Vec3::new(4.0, 5.0, 6.0)).length() < 0.001);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let result = Mesh::new(positions, Vec::new(), vec![Face::new([0, 1, 3])]);

        match result {
            Err(MeshError::IndexOutOfRange { index, count, .. }) => {
                assert_eq!(index, 3);
                assert_eq!(count, 3);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_normal_rejected() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let faces = vec![Face::with_normals([0, 1, 2], [0, 0, 1])];
        let result = Mesh::new(positions, vec![Vec3::Z], faces);
        assert!(matches!(
            result,
            Err(MeshError::IndexOutOfRange { kind: "normal", .. })
        ));
    }

    #[test]
    fn test_parse_obj_triangulates_quad() {
        let mesh = parse(QUAD_OBJ).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.has_normals());

        // Indices are 0-based
        for face in &mesh.faces {
            assert!(face.vertices.iter().all(|&i| i < 4));
            assert_eq!(face.normals, Some([0, 0, 0]));
        }
        assert_eq!(mesh.triangle_normals(0), Some([Vec3::Z; 3]));
    }

    #[test]
    fn test_parse_obj_without_normals() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
        assert_eq!(mesh.triangle_normals(0), None);
    }

    #[test]
    fn test_parse_obj_merges_objects() {
        let text = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";
        let mesh = parse(text).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);

        // Second triangle sits at z = 1
        for p in mesh.triangle(1) {
            assert!((p.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_parse_obj_malformed_fails() {
        let result = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 two 3\n");
        assert!(matches!(result, Err(MeshError::Parse { .. })));
    }

    #[test]
    fn test_parse_obj_empty_fails() {
        let result = parse("# nothing here\n");
        assert!(matches!(result, Err(MeshError::Empty(_))));
    }

    #[test]
    fn test_load_obj_missing_file() {
        let result = Mesh::load_obj("/definitely/not/here.obj");
        assert!(matches!(result, Err(MeshError::Open { .. })));
    }

    #[test]
    fn test_mesh_cache_shares_meshes() {
        let path = std::env::temp_dir().join(format!("lumen_mesh_cache_{}.obj", std::process::id()));
        std::fs::write(&path, QUAD_OBJ).unwrap();
        let key = path.to_string_lossy().to_string();

        let mut cache = MeshCache::new();
        assert!(cache.is_empty());

        let a = cache.load(&key).unwrap();
        let b = cache.load(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key).is_some());

        std::fs::remove_file(&path).ok();
    }
}
