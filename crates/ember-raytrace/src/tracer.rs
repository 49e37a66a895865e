//! parry3d-backed triangle ray tracer.

use ember_math::{Aabb3, Point3, Ray, Triangle3, Vec3};
use parry3d::query::{Ray as ParryRay, RayCast};
use parry3d::shape::{FeatureId, TriMesh};

use crate::error::{RaytraceError, Result};

/// Closest intersection of a ray with the triangle set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Ray parameter of the hit (world units along the unit direction).
    pub distance: f32,
    /// Index of the triangle in the order it was given to [`TriangleRayTracer::build`].
    pub triangle_index: usize,
    /// World-space hit point.
    pub point: Point3,
    /// Unit surface normal at the hit.
    pub normal: Vec3,
}

/// Acceleration structure over a fixed set of world-space triangles.
///
/// An empty triangle set is valid; every query against it reports no hit.
pub struct TriangleRayTracer {
    mesh: Option<TriMesh>,
    bounds: Aabb3,
}

impl TriangleRayTracer {
    /// Build over `triangles`. Triangle indices in hits refer to this slice.
    pub fn build(triangles: &[Triangle3]) -> Result<Self> {
        if triangles.is_empty() {
            log::debug!("ray tracer built over an empty triangle set");
            return Ok(Self {
                mesh: None,
                bounds: Aabb3::maximum_reversed(),
            });
        }

        let mut vertices = Vec::with_capacity(triangles.len() * 3);
        let mut indices = Vec::with_capacity(triangles.len());
        let mut bounds = Aabb3::maximum_reversed();

        for (i, tri) in triangles.iter().enumerate() {
            if tri.p.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
                return Err(RaytraceError::BuildFailed(format!(
                    "triangle {i} has non-finite vertices"
                )));
            }
            let base = u32::try_from(vertices.len()).map_err(|_| {
                RaytraceError::BuildFailed("too many vertices for 32-bit indices".into())
            })?;
            for p in &tri.p {
                bounds.include_point(p);
                vertices.push(*p);
            }
            indices.push([base, base + 1, base + 2]);
        }

        let mesh = TriMesh::new(vertices, indices)
            .map_err(|e| RaytraceError::BuildFailed(format!("{e:?}")))?;
        log::debug!("ray tracer built over {} triangles", mesh.num_triangles());

        Ok(Self {
            mesh: Some(mesh),
            bounds,
        })
    }

    /// Closest hit along `ray`, or `None`.
    pub fn intersect(&self, ray: &Ray) -> Result<Option<Hit>> {
        self.intersect_within(ray, f32::MAX)
    }

    /// Closest hit along `ray` with `distance <= max_distance`, or `None`.
    pub fn intersect_within(&self, ray: &Ray, max_distance: f32) -> Result<Option<Hit>> {
        if !ray.is_finite() {
            return Err(RaytraceError::QueryFailed(
                "ray origin or direction is not finite".into(),
            ));
        }
        if max_distance.is_nan() || max_distance < 0.0 {
            return Err(RaytraceError::QueryFailed(format!(
                "invalid max distance {max_distance}"
            )));
        }
        let Some(mesh) = &self.mesh else {
            return Ok(None);
        };

        let parry_ray = ParryRay::new(ray.origin, ray.direction.into_inner());
        let Some(hit) = mesh.cast_local_ray_and_get_normal(&parry_ray, max_distance, false) else {
            return Ok(None);
        };

        let n = mesh.num_triangles();
        let triangle_index = match hit.feature {
            // Back-face hits are reported with an offset of `n`.
            FeatureId::Face(id) if (id as usize) >= n => id as usize - n,
            FeatureId::Face(id) => id as usize,
            other => {
                return Err(RaytraceError::QueryFailed(format!(
                    "unexpected hit feature {other:?}"
                )))
            }
        };

        Ok(Some(Hit {
            distance: hit.time_of_impact,
            triangle_index,
            point: ray.at(hit.time_of_impact),
            normal: hit.normal,
        }))
    }

    /// True if anything lies along `ray` within `max_distance`.
    pub fn occluded(&self, ray: &Ray, max_distance: f32) -> Result<bool> {
        Ok(self.intersect_within(ray, max_distance)?.is_some())
    }

    /// Number of triangles in the structure.
    pub fn triangle_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, |m| m.num_triangles())
    }

    /// True if built over no triangles.
    pub fn is_empty(&self) -> bool {
        self.mesh.is_none()
    }

    /// Bounds of all triangles; inverted when empty.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }
}

impl std::fmt::Debug for TriangleRayTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriangleRayTracer")
            .field("triangles", &self.triangle_count())
            .field("bounds", &self.bounds)
            .finish()
    }
}
