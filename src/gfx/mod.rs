//! # Graphics Module
//!
//! Scene representation and the rendering surface it drives.
//!
//! ## Architecture Overview
//!
//! - **Transforms** ([`transform`]) - Location/rotation/scale triples
//! - **Scene Management** ([`scene`]) - Attachment hierarchy, objects,
//!   effects and the [`Scene`] orchestrator
//! - **Cameras** ([`camera`]) - First-person cameras living in the graph
//! - **Rendering** ([`rendering`]) - The [`RenderSink`] backend trait and a
//!   recording implementation
//! - **Resources** ([`resources`]) - Meshes, keyframes and materials
//! - **Picking** ([`picking`]) - Stencil tags read back on click
//! - **Geometry** ([`geometry`]) - Procedural shapes
//!
//! [`Scene`]: scene::Scene
//! [`RenderSink`]: rendering::RenderSink

pub mod camera;
pub mod geometry;
pub mod picking;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod transform;

// Re-export commonly used types
pub use camera::Camera;
pub use transform::Transform;
