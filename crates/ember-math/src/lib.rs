#![warn(missing_docs)]

//! Math types for the ember scene subsystem.
//!
//! Thin wrappers around nalgebra providing the world-space types the scene
//! works in: points, vectors, affine transforms, axis-aligned boxes, rays
//! and triangles, together with the geometric predicates (ray-box,
//! ray-triangle, box-triangle) used by the spatial structures.
//!
//! Everything is `f32`, matching the GPU-side layout of vertex and surfel
//! data.

mod aabb;
mod ray;
mod triangle;

pub use aabb::Aabb3;
pub use ray::Ray;
pub use triangle::Triangle3;

use nalgebra::{Matrix4, Unit, UnitQuaternion, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f32>>;

/// A vector in 2D space (surface parameterization, texture coordinates).
pub type Vec2 = Vector2<f32>;

/// A unit quaternion rotation.
pub type Rotation = UnitQuaternion<f32>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation by a unit quaternion.
    pub fn rotation(rotation: &Rotation) -> Self {
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Rotation from Euler angles in radians, applied X then Y then Z.
    pub fn rotation_euler(x: f32, y: f32, z: f32) -> Self {
        Self::rotation(&Rotation::from_euler_angles(x, y, z))
    }

    /// Model matrix composed from translation, rotation and scale.
    ///
    /// Points are scaled first, then rotated, then translated (`T * R * S`).
    pub fn from_trs(translation: Vec3, rotation: Rotation, scale: Vec3) -> Self {
        Self::translation(translation.x, translation.y, translation.z)
            .then(&Self::rotation(&rotation))
            .then(&Self::scale(scale.x, scale.y, scale.z))
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation, applies rotation/scale).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in world units.
    pub linear: f32,
    /// Determinant threshold below which a ray is treated as parallel.
    pub parallel: f32,
}

impl Tolerance {
    /// Default single-precision tolerances.
    pub const DEFAULT: Self = Self {
        linear: 1e-5,
        parallel: 1e-8,
    };
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
