//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::{Point3, Transform, Triangle3, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create a maximally inverted AABB (`min = +inf`, `max = -inf`).
    ///
    /// This is the identity for [`Aabb3::union`] and the seed used when
    /// accumulating boxes; a box that never absorbs anything stays inverted.
    pub fn maximum_reversed() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Build the tightest box around a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::maximum_reversed();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// True if `min > max` on at least one axis.
    pub fn is_inverted(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Componentwise union of two boxes.
    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        Aabb3 {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Test if a point lies inside the box (boundary included).
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Box-triangle containment predicate used for spatial partitioning.
    ///
    /// A triangle belongs to a box when any part of it touches the box, so a
    /// triangle straddling a split plane belongs to both halves.
    pub fn contains_triangle(&self, triangle: &Triangle3) -> bool {
        triangle.overlaps_aabb(self)
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Full edge lengths along each axis.
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// The child box for octant `index` (bit 0 = +x, bit 1 = +y, bit 2 = +z).
    pub fn octant(&self, index: usize) -> Aabb3 {
        let c = self.center();
        Aabb3 {
            min: Point3::new(
                if index & 1 == 0 { self.min.x } else { c.x },
                if index & 2 == 0 { self.min.y } else { c.y },
                if index & 4 == 0 { self.min.z } else { c.z },
            ),
            max: Point3::new(
                if index & 1 == 0 { c.x } else { self.max.x },
                if index & 2 == 0 { c.y } else { self.max.y },
                if index & 4 == 0 { c.z } else { self.max.z },
            ),
        }
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Point3; 8] {
        std::array::from_fn(|i| {
            Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// World-space box enclosing this box after transformation.
    ///
    /// Inverted boxes stay inverted.
    pub fn transformed_by(&self, transform: &Transform) -> Aabb3 {
        if self.is_inverted() {
            return *self;
        }
        let corners = self.corners().map(|p| transform.apply_point(&p));
        Aabb3::from_points(corners.iter())
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::maximum_reversed()
    }
}
