//! Mesh geometry, the OBJ importer and the per-path mesh cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};
use crate::gfx::rendering::sink::{MeshHandle, RenderSink, TextureHandle};
use crate::gfx::resources::material::Material;
use crate::gfx::scene::vertex::Vertex3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
}

impl TextureKind {
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
        }
    }
}

/// Texture file referenced by a mesh material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub kind: TextureKind,
    pub path: PathBuf,
}

/// Indexed triangle mesh in the shared vertex layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    pub textures: Vec<TextureRef>,
}

impl MeshGeometry {
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            textures: Vec::new(),
        }
    }

    pub fn with_texture(mut self, kind: TextureKind, path: impl Into<PathBuf>) -> Self {
        self.textures.push(TextureRef {
            kind,
            path: path.into(),
        });
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Turns a model file into geometry.
pub trait MeshLoader {
    fn load(&self, path: &Path) -> Result<MeshGeometry>;
}

/// Wavefront OBJ importer backed by `tobj`. All models in a file are merged
/// into one mesh; missing normals are rebuilt from face normals. Diffuse and
/// specular maps named by the MTL file resolve against `texture_dir`.
#[derive(Debug, Clone)]
pub struct ObjLoader {
    pub texture_dir: PathBuf,
}

impl Default for ObjLoader {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("resources/textures"),
        }
    }
}

impl MeshLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<MeshGeometry> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|e| LoadError::Mesh {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut geometry = MeshGeometry::default();
        for model in &models {
            let mesh = &model.mesh;
            let base = geometry.vertices.len() as u32;
            let count = mesh.positions.len() / 3;

            let normals = if mesh.normals.len() == mesh.positions.len() {
                mesh.normals.clone()
            } else {
                calculate_vertex_normals(&mesh.positions, &mesh.indices)
            };

            for i in 0..count {
                let tex_coords = if mesh.texcoords.len() >= 2 * (i + 1) {
                    [mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]]
                } else {
                    [0.0, 0.0]
                };
                geometry.vertices.push(Vertex3D::new(
                    [
                        mesh.positions[3 * i],
                        mesh.positions[3 * i + 1],
                        mesh.positions[3 * i + 2],
                    ],
                    [normals[3 * i], normals[3 * i + 1], normals[3 * i + 2]],
                    tex_coords,
                ));
            }
            geometry
                .indices
                .extend(mesh.indices.iter().map(|&i| base + i));
        }

        let materials = materials.unwrap_or_else(|e| {
            log::debug!("No materials for '{}': {}", path.display(), e);
            Vec::new()
        });
        for mtl in &materials {
            if let Some(diffuse) = mtl.diffuse_texture.as_deref().filter(|t| !t.is_empty()) {
                push_unique(&mut geometry.textures, TextureKind::Diffuse, self.texture_dir.join(diffuse));
            }
            if let Some(specular) = mtl.specular_texture.as_deref().filter(|t| !t.is_empty()) {
                push_unique(&mut geometry.textures, TextureKind::Specular, self.texture_dir.join(specular));
            }
        }

        if geometry.vertices.is_empty() {
            return Err(LoadError::Mesh {
                path: path.to_path_buf(),
                message: "file contains no geometry".to_string(),
            });
        }

        log::debug!(
            "Loaded '{}': {} vertices, {} triangles",
            path.display(),
            geometry.vertex_count(),
            geometry.triangle_count()
        );
        Ok(geometry)
    }
}

fn push_unique(textures: &mut Vec<TextureRef>, kind: TextureKind, path: PathBuf) {
    if !textures.iter().any(|t| t.path == path) {
        textures.push(TextureRef { kind, path });
    }
}

/// Area-weighted vertex normals accumulated from triangle faces.
fn calculate_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0.0f32; positions.len()];
    let at = |i: usize| [positions[3 * i], positions[3 * i + 1], positions[3 * i + 2]];

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (pa, pb, pc) = (at(a), at(b), at(c));
        let e1 = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
        let e2 = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for v in [a, b, c] {
            normals[3 * v] += n[0];
            normals[3 * v + 1] += n[1];
            normals[3 * v + 2] += n[2];
        }
    }

    for n in normals.chunks_exact_mut(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > f32::EPSILON {
            n.iter_mut().for_each(|c| *c /= len);
        } else {
            n.copy_from_slice(&[0.0, 1.0, 0.0]);
        }
    }
    normals
}

/// Handle of a mesh in the [`MeshLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

#[derive(Debug)]
pub struct MeshEntry {
    pub path: PathBuf,
    pub geometry: MeshGeometry,
    pub material: Material,
    pub gpu: Option<MeshHandle>,
    pub textures: Vec<(TextureKind, TextureHandle)>,
}

/// Meshes keyed by model path. The first object to load a path decides the
/// mesh material; later objects with the same path share the entry.
#[derive(Debug, Default)]
pub struct MeshLibrary {
    entries: Vec<MeshEntry>,
    by_path: HashMap<PathBuf, MeshId>,
    textures: HashMap<PathBuf, TextureHandle>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MeshId) -> Option<&MeshEntry> {
        self.entries.get(id.0)
    }

    pub fn load(
        &mut self,
        path: &Path,
        material: Material,
        loader: &dyn MeshLoader,
    ) -> Result<MeshId> {
        if let Some(&id) = self.by_path.get(path) {
            log::debug!("Reusing mesh '{}'", path.display());
            return Ok(id);
        }
        let geometry = loader.load(path)?;
        Ok(self.insert(path.to_path_buf(), geometry, material))
    }

    /// Adds geometry that did not come from a file (procedural shapes).
    pub fn insert(&mut self, path: PathBuf, geometry: MeshGeometry, material: Material) -> MeshId {
        let id = MeshId(self.entries.len());
        self.by_path.insert(path.clone(), id);
        self.entries.push(MeshEntry {
            path,
            geometry,
            material,
            gpu: None,
            textures: Vec::new(),
        });
        id
    }

    /// Uploads every entry that has no backend handle yet, together with its
    /// textures. A texture file shared by several meshes is loaded once.
    pub fn upload_pending(&mut self, sink: &mut dyn RenderSink) -> Result<()> {
        for entry in self.entries.iter_mut().filter(|e| e.gpu.is_none()) {
            for texture in &entry.geometry.textures {
                let handle = match self.textures.get(&texture.path) {
                    Some(&handle) => handle,
                    None => {
                        let handle = sink.load_texture(&texture.path)?;
                        self.textures.insert(texture.path.clone(), handle);
                        handle
                    }
                };
                entry.textures.push((texture.kind, handle));
            }
            entry.gpu = Some(sink.upload_mesh(&entry.geometry)?);
        }
        Ok(())
    }
}

/// All keyframes of an animated mesh packed back to back in one vertex
/// stream. Every frame shares the index list of the first frame.
#[derive(Debug, Clone)]
pub struct KeyframeMesh {
    pub geometry: MeshGeometry,
    vertex_count: usize,
    frame_count: usize,
}

impl KeyframeMesh {
    pub fn from_frames(frames: Vec<(PathBuf, MeshGeometry)>) -> Result<Self> {
        let mut frames = frames.into_iter();
        let (_, first) = frames.next().ok_or(LoadError::NoKeyframes)?;
        let vertex_count = first.vertex_count();
        let mut geometry = first;
        let mut frame_count = 1;

        for (path, frame) in frames {
            if frame.vertex_count() != vertex_count {
                return Err(LoadError::KeyframeMismatch {
                    path,
                    expected: vertex_count,
                    found: frame.vertex_count(),
                });
            }
            geometry.vertices.extend(frame.vertices);
            frame_count += 1;
        }

        Ok(Self {
            geometry,
            vertex_count,
            frame_count,
        })
    }

    pub fn load(paths: &[PathBuf], loader: &dyn MeshLoader) -> Result<Self> {
        let frames = paths
            .iter()
            .map(|p| loader.load(p).map(|g| (p.clone(), g)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_frames(frames)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Byte offset of `frame` inside the packed vertex stream.
    pub fn frame_offset(&self, frame: usize) -> usize {
        frame * Vertex3D::STRIDE * self.vertex_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingLoader {
        calls: Cell<usize>,
        vertices: usize,
    }

    impl MeshLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<MeshGeometry> {
            self.calls.set(self.calls.get() + 1);
            Ok(MeshGeometry::new(
                vec![Vertex3D::default(); self.vertices],
                vec![0, 1, 2],
            ))
        }
    }

    fn triangle(vertices: usize) -> MeshGeometry {
        MeshGeometry::new(vec![Vertex3D::default(); vertices], vec![0, 1, 2])
    }

    #[test]
    fn test_library_reuses_mesh_by_path() {
        let loader = CountingLoader {
            calls: Cell::new(0),
            vertices: 3,
        };
        let mut library = MeshLibrary::new();
        let house = Material::new(0.15, 0.75, 0.5, 42.0);

        let a = library.load(Path::new("house.obj"), house, &loader).unwrap();
        let b = library
            .load(Path::new("house.obj"), Material::default(), &loader)
            .unwrap();
        let c = library
            .load(Path::new("tree.obj"), Material::default(), &loader)
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(loader.calls.get(), 2);
        assert_eq!(library.get(a).unwrap().material, house);
    }

    #[test]
    fn test_upload_shares_textures() {
        use crate::gfx::rendering::recorder::RecordingSink;

        let mut library = MeshLibrary::new();
        let crate_mesh = triangle(3).with_texture(TextureKind::Diffuse, "wood.png");
        let barrel_mesh = triangle(3)
            .with_texture(TextureKind::Diffuse, "wood.png")
            .with_texture(TextureKind::Specular, "wood_spec.png");
        let a = library.insert("crate".into(), crate_mesh, Material::default());
        let b = library.insert("barrel".into(), barrel_mesh, Material::default());

        let mut sink = RecordingSink::new();
        library.upload_pending(&mut sink).unwrap();

        let a = library.get(a).unwrap();
        let b = library.get(b).unwrap();
        assert!(a.gpu.is_some() && b.gpu.is_some());
        assert_eq!(a.textures[0].1, b.textures[0].1);
        assert_eq!(b.textures[1].0, TextureKind::Specular);
        assert_eq!(sink.mesh_count(), 2);
    }

    #[test]
    fn test_keyframe_offsets() {
        let frames = (0..3)
            .map(|i| (PathBuf::from(format!("Eagle{i}.obj")), triangle(4)))
            .collect();
        let mesh = KeyframeMesh::from_frames(frames).unwrap();

        assert_eq!(mesh.frame_count(), 3);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.geometry.vertices.len(), 12);
        assert_eq!(mesh.frame_offset(0), 0);
        assert_eq!(mesh.frame_offset(2), 2 * 4 * Vertex3D::STRIDE);
    }

    #[test]
    fn test_keyframe_vertex_mismatch() {
        let frames = vec![
            (PathBuf::from("Eagle0.obj"), triangle(4)),
            (PathBuf::from("Eagle1.obj"), triangle(5)),
        ];
        match KeyframeMesh::from_frames(frames) {
            Err(LoadError::KeyframeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 5);
            }
            other => panic!("expected a mismatch, got {:?}", other.map(|m| m.frame_count())),
        }
    }

    #[test]
    fn test_keyframe_requires_frames() {
        assert!(matches!(
            KeyframeMesh::from_frames(Vec::new()),
            Err(LoadError::NoKeyframes)
        ));
    }

    #[test]
    fn test_obj_loader_reads_file() {
        let path = std::env::temp_dir().join(format!("diorama_tri_{}.obj", std::process::id()));
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
        )
        .unwrap();

        let geometry = ObjLoader::default().load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.triangle_count(), 1);
        for v in &geometry.vertices {
            assert!((v.normal[2] - 1.0).abs() < 1e-6, "normal {:?}", v.normal);
        }
    }

    #[test]
    fn test_obj_loader_missing_file() {
        let path = std::env::temp_dir().join("diorama_does_not_exist.obj");
        assert!(matches!(
            ObjLoader::default().load(&path),
            Err(LoadError::Mesh { .. })
        ));
    }
}
