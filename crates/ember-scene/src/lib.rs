#![warn(missing_docs)]

//! Scene spatial data for the ember renderer.
//!
//! A [`Scene`] owns lights, mesh instances and light probes in
//! [`PackedLookupTable`]s, classifies instances as static or dynamic, and
//! builds two structures over the static triangles:
//!
//! - a [`SparseOctree`](ember_octree::SparseOctree) of [`MeshTriangleRef`]s
//! - a [`TriangleRayTracer`](ember_raytrace::TriangleRayTracer)
//!
//! It also packs baked [`Surfel`]s into a [`SurfelGBuffer`] for the lighting
//! pass.
//!
//! # Example
//!
//! ```
//! use ember_math::{Point3, Ray};
//! use ember_scene::{Mesh, MeshInstance, ResourcePool, Scene};
//!
//! let mut pool = ResourcePool::default();
//! let cube_id = pool.add_mesh(Mesh::cuboid(1.0, 1.0, 1.0));
//!
//! let mut scene = Scene::default();
//! scene.add_static_mesh_instance(MeshInstance::new(cube_id, &pool).unwrap());
//! scene.calculate_bounding_box();
//! scene.build_static_geometry_octree(&pool).unwrap();
//!
//! let ray = Ray::from_points(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, -5.0));
//! let hit = scene.raycast_static_octree(&ray).unwrap().unwrap();
//! assert!((hit.distance - 4.5).abs() < 1e-4);
//! ```

mod config;
mod error;
pub mod extract;
mod instance;
mod light;
mod mesh;
mod scene;
mod surfel;
mod table;
mod view;

pub use config::{MalformedGeometryPolicy, SceneConfig, TableCapacity, MAX_OCTREE_DEPTH};
pub use error::{Result, SceneError};
pub use extract::MeshTriangleRef;
pub use instance::MeshInstance;
pub use light::{DirectionalLight, LightProbe, PointLight};
pub use mesh::{Mesh, ResourcePool, SubMesh, Vertex};
pub use scene::{BuildState, Scene, StaticGeometryOctree, StaticGeometryState, StaticRayTracer};
pub use surfel::{
    DiffuseLightProbe, Surfel, SurfelChannel, SurfelCluster, SurfelClusterProjection,
    SurfelGBuffer,
};
pub use table::{
    DirectionalLightId, LightProbeId, MeshId, MeshInstanceId, PackedLookupTable, PointLightId,
    SubMeshId,
};
pub use view::{Camera, Skybox};
