//! # Procedural Geometry Generation
//!
//! Shapes built in code rather than loaded from model files. The scene
//! only needs a cube (the textured "Box" prop).
//!
//! ```
//! use diorama::gfx::geometry::generate_cube;
//!
//! let cube = generate_cube();
//! assert_eq!(cube.vertex_count(), 24);
//! assert_eq!(cube.triangle_count(), 12);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::gfx::resources::mesh::MeshGeometry;
use crate::gfx::scene::vertex::Vertex3D;

/// Generated geometry, one attribute per array.
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the attribute arrays into the mesh vertex format.
    /// Missing normals default to +Y, missing UVs to the origin.
    pub fn into_mesh(self) -> MeshGeometry {
        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                Vertex3D::new(
                    position,
                    self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                )
            })
            .collect();

        MeshGeometry::new(vertices, self.indices)
    }
}
