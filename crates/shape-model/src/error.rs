//! Error types for shape-model operations.

use std::path::PathBuf;

use scan_mesh::MeshError;
use thiserror::Error;

use crate::registration::RegistrationFailure;

/// Result type alias for shape-model operations.
pub type ShapeModelResult<T> = Result<T, ShapeModelError>;

/// Errors that can occur while building or using a shape model.
#[derive(Debug, Error)]
pub enum ShapeModelError {
    /// Malformed input, e.g. a baseline without vertices.
    #[error("invalid input: {details}")]
    InvalidInput { details: String },

    /// Corpus directory missing or unreadable.
    #[error("cannot read corpus directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not enough shapes to continue.
    #[error("insufficient data: {details}")]
    InsufficientData { details: String },

    /// Registered shapes disagree on vertex count.
    #[error("topology mismatch in shape {index} ({name}): expected {expected} vertices, found {found}")]
    TopologyMismatch {
        index: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    /// The data matrix cannot be decomposed.
    #[error("decomposition failed: {details}")]
    Decomposition { details: String },

    /// Synthesis requested before any model was fitted.
    #[error("no shape model has been fitted")]
    ModelNotFitted,

    /// Coefficient vector longer than the number of modes.
    #[error("got {got} coefficients but the model has only {modes} modes")]
    DimensionMismatch { got: usize, modes: usize },

    /// Registration failed for a shape while the strict policy was active.
    #[error("registration of shape {index} ({name}) failed: {source}")]
    Registration {
        index: usize,
        name: String,
        #[source]
        source: RegistrationFailure,
    },

    /// Mesh loading, saving or editing failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Invalid or unreadable pipeline configuration.
    #[error("invalid configuration: {details}")]
    Config { details: String },

    /// A model file could not be written or read back.
    #[error("model file {path}: {details}")]
    Persist { path: PathBuf, details: String },
}
