//! # Scene Module
//!
//! The attachment hierarchy, everything that lives in it, and the [`Scene`]
//! that owns them.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - Arena of nodes addressed by [`NodeId`], with parent
//!   links and world/relative transform queries
//! - [`GameObject`] - A node plus its mesh, role and visibility
//! - [`AnimatedActor`] - Keyframed mesh flying a circular path
//! - [`effects`] - Muzzle flash, chest lid and day/night timers
//! - [`Scene`] - Loading, per-frame update, picking and render passes
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::rc::Rc;
//! use diorama::gfx::rendering::RecordingSink;
//! use diorama::gfx::resources::ObjLoader;
//! use diorama::gfx::scene::{Scene, SceneAssets};
//! use diorama::time::SystemClock;
//!
//! let mut sink = RecordingSink::new();
//! let mut scene = Scene::load_file(
//!     Path::new("resources/scene.txt"),
//!     &SceneAssets::default(),
//!     &ObjLoader::default(),
//!     &mut sink,
//!     Rc::new(SystemClock::new()),
//! )?;
//! scene.update(0.016);
//! scene.render(&mut sink);
//! # Ok::<(), diorama::error::LoadError>(())
//! ```

pub mod actor;
pub mod effects;
pub mod graph;
pub mod lights;
pub mod loader;
pub mod object;
pub mod scene;
pub mod vertex;

// Re-export main types
pub use actor::{AnimatedActor, CirclePath};
pub use effects::{ChestLid, DayNightCycle, FogParams, MuzzleFlash};
pub use graph::{NodeId, SceneGraph, SceneObject};
pub use lights::Lighting;
pub use loader::{parse_scene, read_scene_file, SceneEntry};
pub use object::{GameObject, ObjectRole};
pub use scene::{water_uv_transform, InputAction, Scene, SceneAssets};
pub use vertex::Vertex3D;
