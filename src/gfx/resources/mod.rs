// src/gfx/resources/mod.rs
//! Mesh and material resources
//!
//! Handles model import, the per-path mesh cache, keyframe packing and
//! GPU textures.

pub mod material;
pub mod mesh;
pub mod texture_resource;

// Re-export main types
pub use material::Material;
pub use mesh::{
    KeyframeMesh, MeshGeometry, MeshId, MeshLibrary, MeshLoader, ObjLoader, TextureKind, TextureRef,
};
pub use texture_resource::{TextureDimension, TextureResource};
