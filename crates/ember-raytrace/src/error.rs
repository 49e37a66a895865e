//! Error types for the ray-casting backend.

use thiserror::Error;

/// Errors reported by [`crate::TriangleRayTracer`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RaytraceError {
    /// The backend rejected the triangle set.
    #[error("failed to build acceleration structure: {0}")]
    BuildFailed(String),

    /// The query could not be answered.
    #[error("ray query failed: {0}")]
    QueryFailed(String),
}

/// Result type for ray-casting operations.
pub type Result<T> = std::result::Result<T, RaytraceError>;
