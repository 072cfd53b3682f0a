// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! The backend-facing command surface, the wgpu backend that draws it into
//! the window, and a recording backend for tests.

pub mod draw_list;
pub mod pipeline_manager;
pub mod recorder;
pub mod render_engine;
pub mod sink;
pub mod uniforms;

// Re-export main types
pub use draw_list::{DrawCall, DrawList, TextureSlots};
pub use pipeline_manager::{PipelineKey, PipelineManager};
pub use recorder::{RecordingSink, RenderCommand};
pub use render_engine::RenderEngine;
pub use sink::{
    MeshHandle, PickBuffer, ProgramHandle, RenderSink, TextureHandle, UniformValue,
};
pub use uniforms::DrawUniforms;
