//! # Render Backend Surface
//!
//! The scene never talks to a graphics API directly. It drives a
//! [`RenderSink`]: resources are created once during load and return
//! opaque handles, then every frame issues a flat command stream (select
//! program, set named uniforms, toggle fixed-function state, draw).
//!
//! Picking reads back the stencil tags written by the previous frame
//! through [`PickBuffer`].

use std::path::Path;

use cgmath::{Matrix3, Matrix4, Vector3, Vector4};

use crate::error::Result;
use crate::gfx::resources::material::Material;
use crate::gfx::resources::mesh::MeshGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Value of a named shader parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat3(Matrix3<f32>),
    Mat4(Matrix4<f32>),
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(v: Matrix3<f32>) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(v: Matrix4<f32>) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Graphics backend driven by the scene.
///
/// Resource creation is fallible and only happens during load. Per-frame
/// commands cannot fail; a backend reports its own runtime problems.
pub trait RenderSink {
    /// Called once before the scene issues a frame.
    fn begin_frame(&mut self) {}

    /// Called once after the scene issued a frame. A windowed backend
    /// submits and presents here.
    fn end_frame(&mut self) {}

    /// The render target changed size.
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn create_program(&mut self, name: &str, vertex: &Path, fragment: &Path)
        -> Result<ProgramHandle>;

    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle>;

    /// Faces in +X, -X, +Y, -Y, +Z, -Z order.
    fn load_cubemap(&mut self, faces: &[&Path; 6]) -> Result<TextureHandle>;

    fn upload_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle>;

    fn use_program(&mut self, program: ProgramHandle);

    /// Sets a named parameter on the program selected by `use_program`.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn bind_material(&mut self, material: &Material);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_blending(&mut self, enabled: bool);

    /// Tags every pixel drawn until [`RenderSink::clear_stencil_tag`] with `tag`.
    fn set_stencil_tag(&mut self, tag: u8);

    fn clear_stencil_tag(&mut self);

    fn draw_mesh(&mut self, mesh: MeshHandle);

    /// Draws a keyframed mesh reading the current and next frame streams
    /// at the given byte offsets.
    fn draw_keyframes(&mut self, mesh: MeshHandle, current_offset: usize, next_offset: usize);
}

/// Reads back the stencil tag at a window-space pixel (origin bottom left).
pub trait PickBuffer {
    fn read_pick_id(&self, x: u32, y: u32) -> u8;
}

/// `set_uniform` with any value convertible to [`UniformValue`].
pub fn set<V: Into<UniformValue>>(sink: &mut dyn RenderSink, name: &str, value: V) {
    sink.set_uniform(name, value.into());
}
