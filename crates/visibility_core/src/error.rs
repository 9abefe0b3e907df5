//! Crate-wide error type

use thiserror::Error;

use crate::config::ConfigError;

/// Errors produced while building cascades or draw lists
///
/// Contract violations (too many cascades, non-increasing splits, an empty
/// meshgroup list, an out-of-range frame slot) are assertions, not errors.
#[derive(Error, Debug)]
pub enum CullError {
    /// The near/far clipper produced more triangles than its working list holds
    #[error("Near/far clip exceeded its triangle capacity of {capacity}")]
    ClipCapacityExceeded {
        /// Fixed capacity of the working list
        capacity: usize,
    },

    /// The camera view-projection has no inverse, so its frustum corners are undefined
    #[error("Camera view-projection matrix is singular")]
    SingularCameraMatrix,

    /// A GPU output buffer is too small for the scene
    #[error("GPU buffer '{buffer}' holds {capacity} entries, {required} required")]
    GpuCapacityExceeded {
        /// Buffer name
        buffer: &'static str,
        /// Entries available
        capacity: usize,
        /// Entries required
        required: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the crate
pub type CullResult<T> = Result<T, CullError>;
