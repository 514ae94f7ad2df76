//! Error types for WarpTrack.

use thiserror::Error;

/// Main error type for tracker construction and per-frame calls.
///
/// Per-frame terminal outcomes such as divergence are not errors; they are
/// reported through the tracking state of a frame outcome. An `Err` from a
/// per-frame call means the input itself was unusable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Template region yields no usable points")]
    EmptyRegion,

    #[error("Degenerate region: Hessian condition number {condition:e}")]
    DegenerateRegion { condition: f64 },

    #[error("Parameter count mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for WarpTrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
