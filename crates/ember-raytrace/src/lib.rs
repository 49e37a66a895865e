#![warn(missing_docs)]

//! Ray casting against triangle soups.
//!
//! [`TriangleRayTracer`] owns a [`parry3d`] triangle mesh with its internal
//! BVH and answers nearest-hit and occlusion queries in world space. The
//! scene builds one over all static triangles and swaps it in atomically.

mod error;
mod tracer;

pub use error::{RaytraceError, Result};
pub use tracer::{Hit, TriangleRayTracer};
