//! World-space triangles and their geometric predicates.

use crate::{Aabb3, Point3, Ray, Tolerance, Transform, Vec3};

/// A triangle given by three world-space points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    /// Vertex positions in winding order.
    pub p: [Point3; 3],
}

impl Triangle3 {
    /// Create a triangle from three points.
    pub fn new(p0: Point3, p1: Point3, p2: Point3) -> Self {
        Self { p: [p0, p1, p2] }
    }

    /// Tight bounding box of the three vertices.
    pub fn aabb(&self) -> Aabb3 {
        Aabb3::from_points(self.p.iter())
    }

    /// Average of the three vertices.
    pub fn centroid(&self) -> Point3 {
        Point3::from((self.p[0].coords + self.p[1].coords + self.p[2].coords) / 3.0)
    }

    /// Unnormalized face normal (`(p1 - p0) x (p2 - p0)`), length = 2 * area.
    pub fn scaled_normal(&self) -> Vec3 {
        (self.p[1] - self.p[0]).cross(&(self.p[2] - self.p[0]))
    }

    /// Unit face normal following the winding order, `None` when degenerate.
    pub fn normal(&self) -> Option<Vec3> {
        self.scaled_normal().try_normalize(f32::EPSILON)
    }

    /// Triangle area.
    pub fn area(&self) -> f32 {
        0.5 * self.scaled_normal().norm()
    }

    /// The triangle with each vertex transformed as a point.
    pub fn transformed_by(&self, transform: &Transform) -> Self {
        Self {
            p: self.p.map(|v| transform.apply_point(&v)),
        }
    }

    /// Ray-triangle intersection (Möller-Trumbore), both faces.
    ///
    /// Returns the ray parameter of the hit. Hits behind the origin and rays
    /// parallel to the triangle plane report `None`.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let tol = Tolerance::DEFAULT;
        let dir = ray.direction.as_ref();
        let e1 = self.p[1] - self.p[0];
        let e2 = self.p[2] - self.p[0];

        let pvec = dir.cross(&e2);
        let det = e1.dot(&pvec);
        if det.abs() < tol.parallel {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - self.p[0];
        let u = tvec.dot(&pvec) * inv_det;
        if !(-tol.linear..=1.0 + tol.linear).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&e1);
        let v = dir.dot(&qvec) * inv_det;
        if v < -tol.linear || u + v > 1.0 + tol.linear {
            return None;
        }

        let t = e2.dot(&qvec) * inv_det;
        if t >= 0.0 {
            Some(t)
        } else {
            None
        }
    }

    /// Triangle-box overlap by the separating axis theorem.
    ///
    /// Touching counts as overlap; the box is inflated by the linear
    /// tolerance so triangles lying exactly on a face are not lost to
    /// rounding.
    pub fn overlaps_aabb(&self, aabb: &Aabb3) -> bool {
        if aabb.is_inverted() {
            return false;
        }

        let c = aabb.center();
        let h = aabb.extents() * 0.5 + Vec3::repeat(Tolerance::DEFAULT.linear);
        let v = self.p.map(|p| p - c);
        let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];

        let separated = |axis: &Vec3| -> bool {
            let p0 = v[0].dot(axis);
            let p1 = v[1].dot(axis);
            let p2 = v[2].dot(axis);
            let r = h.x * axis.x.abs() + h.y * axis.y.abs() + h.z * axis.z.abs();
            p0.min(p1).min(p2) > r || p0.max(p1).max(p2) < -r
        };

        // Box face normals.
        for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
            if separated(&axis) {
                return false;
            }
        }

        // Triangle plane.
        if separated(&edges[0].cross(&edges[1])) {
            return false;
        }

        // Edge cross products. A zero axis never separates.
        for edge in &edges {
            for unit in [Vec3::x(), Vec3::y(), Vec3::z()] {
                if separated(&unit.cross(edge)) {
                    return false;
                }
            }
        }

        true
    }
}
