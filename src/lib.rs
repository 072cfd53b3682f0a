// src/lib.rs
//! Diorama
//!
//! A real-time 3D scene viewer: a parent-attachment scene graph, a
//! keyframe-animated actor, timed scene effects and stencil-based object
//! picking, driven by winit and rendered with wgpu behind a pluggable
//! backend trait.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod input;
pub mod time;

// Re-export main types for convenience
pub use app::Application;
pub use config::{AppConfig, Config};
pub use gfx::scene::Scene;
