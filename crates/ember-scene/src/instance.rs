//! Placed copies of shared meshes.

use ember_math::{Aabb3, Transform};

use crate::error::Result;
use crate::mesh::ResourcePool;
use crate::table::MeshId;

/// A mesh placed in the world by a model transform.
///
/// The world-space bounding box is derived from the mesh box and refreshed
/// whenever the transform changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    mesh_id: MeshId,
    transform: Transform,
    mesh_bounding_box: Aabb3,
    bounding_box: Aabb3,
}

impl MeshInstance {
    /// Instance of the mesh stored under `mesh_id` at the identity transform.
    pub fn new(mesh_id: MeshId, resources: &ResourcePool) -> Result<Self> {
        let mesh_bounding_box = *resources.mesh(mesh_id)?.bounding_box();
        Ok(Self {
            mesh_id,
            transform: Transform::identity(),
            mesh_bounding_box,
            bounding_box: mesh_bounding_box,
        })
    }

    /// Builder form of [`MeshInstance::set_transform`].
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.set_transform(transform);
        self
    }

    /// The shared mesh this instance draws.
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    /// Model transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Replace the model transform.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.bounding_box = self.mesh_bounding_box.transformed_by(&transform);
    }

    /// World-space bounding box.
    pub fn bounding_box(&self) -> &Aabb3 {
        &self.bounding_box
    }
}
