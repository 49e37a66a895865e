//! World-space triangle extraction from mesh instances.
//!
//! Both static geometry structures are fed from [`extract`]; they differ only
//! in the payload built per triangle.

use ember_math::Triangle3;

use crate::config::MalformedGeometryPolicy;
use crate::error::{Result, SceneError};
use crate::instance::MeshInstance;
use crate::mesh::ResourcePool;
use crate::table::{MeshInstanceId, PackedLookupTable, SubMeshId};

/// A world-space triangle tagged with the instance and submesh it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshTriangleRef {
    /// Source instance.
    pub mesh_instance_id: MeshInstanceId,
    /// Source submesh of the instance's mesh.
    pub sub_mesh_id: SubMeshId,
    /// World-space triangle.
    pub triangle: Triangle3,
}

/// Walk the submeshes of each instance in `ids`, transform every triangle by
/// the instance's model matrix and collect `make(instance, submesh, triangle)`.
///
/// Unknown instance or mesh IDs are [`SceneError::InvalidId`]. Submeshes
/// whose vertex count is not a multiple of 3 are handled per `policy`.
pub fn extract<P>(
    instances: &PackedLookupTable<MeshInstanceId, MeshInstance>,
    ids: &[MeshInstanceId],
    resources: &ResourcePool,
    policy: MalformedGeometryPolicy,
    mut make: impl FnMut(MeshInstanceId, SubMeshId, Triangle3) -> P,
) -> Result<Vec<P>> {
    let mut out = Vec::new();

    for &instance_id in ids {
        let instance = instances.get(instance_id)?;
        let mesh = resources.mesh(instance.mesh_id())?;
        let model = instance.transform();

        for (sub_mesh_id, sub_mesh) in mesh.sub_meshes().iter() {
            if !sub_mesh.is_well_formed() {
                match policy {
                    MalformedGeometryPolicy::Fail => {
                        return Err(SceneError::MalformedGeometry {
                            mesh: mesh.name().to_string(),
                            sub_mesh: sub_mesh.name.clone(),
                            vertex_count: sub_mesh.vertices.len(),
                        });
                    }
                    MalformedGeometryPolicy::Skip => {
                        log::warn!(
                            "skipping submesh '{}' of mesh '{}': {} vertices is not a multiple of 3",
                            sub_mesh.name,
                            mesh.name(),
                            sub_mesh.vertices.len()
                        );
                        continue;
                    }
                }
            }

            out.reserve(sub_mesh.triangle_count());
            for tri in sub_mesh.vertices.chunks_exact(3) {
                let triangle = Triangle3::new(
                    model.apply_point(&tri[0].position),
                    model.apply_point(&tri[1].position),
                    model.apply_point(&tri[2].position),
                );
                out.push(make(instance_id, sub_mesh_id, triangle));
            }
        }
    }

    Ok(out)
}

/// World-space triangles only, as the ray tracer consumes them.
pub fn extract_triangles(
    instances: &PackedLookupTable<MeshInstanceId, MeshInstance>,
    ids: &[MeshInstanceId],
    resources: &ResourcePool,
    policy: MalformedGeometryPolicy,
) -> Result<Vec<Triangle3>> {
    extract(instances, ids, resources, policy, |_, _, t| t)
}

/// Tagged triangles, as the octree stores them.
pub fn extract_triangle_refs(
    instances: &PackedLookupTable<MeshInstanceId, MeshInstance>,
    ids: &[MeshInstanceId],
    resources: &ResourcePool,
    policy: MalformedGeometryPolicy,
) -> Result<Vec<MeshTriangleRef>> {
    extract(
        instances,
        ids,
        resources,
        policy,
        |mesh_instance_id, sub_mesh_id, triangle| MeshTriangleRef {
            mesh_instance_id,
            sub_mesh_id,
            triangle,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Mesh, SubMesh, Vertex};
    use ember_math::{Point3, Transform};

    fn setup() -> (
        ResourcePool,
        PackedLookupTable<MeshInstanceId, MeshInstance>,
        Vec<MeshInstanceId>,
    ) {
        let mut pool = ResourcePool::default();
        let mesh_id = pool.add_mesh(Mesh::cuboid(1.0, 1.0, 1.0));
        let mut instances = PackedLookupTable::new();
        let a = instances.insert(MeshInstance::new(mesh_id, &pool).unwrap());
        let b = instances.insert(
            MeshInstance::new(mesh_id, &pool)
                .unwrap()
                .with_transform(Transform::translation(5.0, 0.0, 0.0)),
        );
        (pool, instances, vec![a, b])
    }

    #[test]
    fn test_triangles_are_transformed() {
        let (pool, instances, ids) = setup();
        let tris = extract_triangles(&instances, &ids, &pool, MalformedGeometryPolicy::Fail).unwrap();
        assert_eq!(tris.len(), 24);
        for t in &tris[..12] {
            assert!(t.p.iter().all(|p| p.x.abs() <= 0.5 + 1e-6));
        }
        for t in &tris[12..] {
            assert!(t.p.iter().all(|p| (p.x - 5.0).abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn test_refs_match_plain_triangles() {
        let (pool, instances, ids) = setup();
        let policy = MalformedGeometryPolicy::Fail;
        let tris = extract_triangles(&instances, &ids, &pool, policy).unwrap();
        let refs = extract_triangle_refs(&instances, &ids, &pool, policy).unwrap();
        assert_eq!(tris.len(), refs.len());
        for (t, r) in tris.iter().zip(&refs) {
            assert_eq!(*t, r.triangle);
        }
        assert!(refs[..12].iter().all(|r| r.mesh_instance_id == ids[0]));
        assert!(refs[12..].iter().all(|r| r.mesh_instance_id == ids[1]));
    }

    #[test]
    fn test_subset_of_ids() {
        let (pool, instances, ids) = setup();
        let tris =
            extract_triangles(&instances, &ids[1..], &pool, MalformedGeometryPolicy::Fail).unwrap();
        assert_eq!(tris.len(), 12);
    }

    #[test]
    fn test_malformed_submesh() {
        let mut pool = ResourcePool::default();
        let v = Vertex::at(Point3::origin());
        let mut mesh = Mesh::cuboid(1.0, 1.0, 1.0);
        mesh.add_sub_mesh(SubMesh::new("broken", vec![v; 4]));
        let mesh_id = pool.add_mesh(mesh);
        let mut instances = PackedLookupTable::new();
        let ids = vec![instances.insert(MeshInstance::new(mesh_id, &pool).unwrap())];

        let err = extract_triangles(&instances, &ids, &pool, MalformedGeometryPolicy::Fail)
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::MalformedGeometry {
                vertex_count: 4,
                ..
            }
        ));

        let tris =
            extract_triangles(&instances, &ids, &pool, MalformedGeometryPolicy::Skip).unwrap();
        assert_eq!(tris.len(), 12);
    }

    #[test]
    fn test_stale_instance_id() {
        let (pool, mut instances, ids) = setup();
        instances.remove(ids[0]).unwrap();
        let err =
            extract_triangles(&instances, &ids, &pool, MalformedGeometryPolicy::Fail).unwrap_err();
        assert!(matches!(err, SceneError::InvalidId { .. }));
    }

    #[test]
    fn test_empty_id_list() {
        let (pool, instances, _) = setup();
        let tris = extract_triangles(&instances, &[], &pool, MalformedGeometryPolicy::Fail).unwrap();
        assert!(tris.is_empty());
    }
}
