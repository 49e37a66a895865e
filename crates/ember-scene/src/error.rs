//! Error types for scene operations.

use ember_raytrace::RaytraceError;
use thiserror::Error;

/// Errors that can occur while building or querying a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Lookup with an ID that was removed or never issued by this table.
    #[error("invalid {table}: stale or unknown id")]
    InvalidId {
        /// Key type of the table that rejected the lookup.
        table: &'static str,
    },

    /// A submesh whose vertex count is not a multiple of 3.
    #[error("malformed geometry in mesh '{mesh}', submesh '{sub_mesh}': {vertex_count} vertices is not a multiple of 3")]
    MalformedGeometry {
        /// Mesh name.
        mesh: String,
        /// Submesh name.
        sub_mesh: String,
        /// Offending vertex count.
        vertex_count: usize,
    },

    /// The acceleration structure could not be built.
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// A ray query could not be answered.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Surfel data could not be packed into a GPU buffer.
    #[error("surfel gbuffer: {0}")]
    GBuffer(String),

    /// A surfel cluster, projection or probe refers outside its target list.
    #[error("invalid surfel link: {0}")]
    InvalidSurfelLink(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RaytraceError> for SceneError {
    fn from(e: RaytraceError) -> Self {
        match e {
            RaytraceError::BuildFailed(msg) => SceneError::BuildFailed(msg),
            RaytraceError::QueryFailed(msg) => SceneError::QueryFailed(msg),
        }
    }
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;
