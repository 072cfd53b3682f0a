//! Error types for scene loading and scene graph edits.

use std::path::PathBuf;

use thiserror::Error;

use crate::gfx::scene::graph::NodeId;

/// Errors raised while reading the `KEY VALUE` configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The same key appears twice.
    #[error("duplicate config key '{0}'")]
    DuplicateKey(String),

    /// A key at the end of the input has no value.
    #[error("config key '{0}' has no value")]
    DanglingKey(String),

    /// A required key is absent.
    #[error("missing config key '{0}'")]
    MissingKey(String),

    /// A value does not parse as the requested type.
    #[error("config key '{key}' has invalid value '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Errors raised during the load phase. Any of these aborts startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scene file line does not hold the expected eleven fields.
    #[error("scene line {line}: {message}")]
    MalformedScene { line: usize, message: String },

    #[error("failed to load mesh '{path}': {message}")]
    Mesh { path: PathBuf, message: String },

    #[error("keyframe '{path}' has {found} vertices, expected {expected}")]
    KeyframeMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("animated mesh has no keyframes")]
    NoKeyframes,

    #[error("failed to create shader program '{name}': {message}")]
    Shader { name: String, message: String },

    #[error("failed to load texture '{path}': {message}")]
    Texture { path: PathBuf, message: String },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Errors raised when editing the attachment hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),

    #[error("attaching {child:?} to {parent:?} would create a cycle")]
    AttachCycle { child: NodeId, parent: NodeId },
}

/// Result type alias for load-phase operations.
pub type Result<T> = std::result::Result<T, LoadError>;
