pub mod camera;

// Re-export main types
pub use camera::Camera;
