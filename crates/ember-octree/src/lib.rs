#![warn(missing_docs)]

//! Generic sparse octree for ember scene queries.
//!
//! The tree is agnostic to what it stores: callers supply a containment
//! predicate (does an item belong in a box) and a collision predicate (where
//! does a ray hit an item). Scenes use it to index static triangles for
//! nearest-hit ray queries.

mod octree;

pub use octree::{
    CollisionFn, ContainmentFn, OctreeHit, OctreeNode, OctreeStats, SparseOctree,
    DEFAULT_MAX_STRADDLE,
};
