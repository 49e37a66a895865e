//! Mesh resources shared between instances.

use ember_math::{Aabb3, Point3, Vec2, Vec3};

use crate::config::TableCapacity;
use crate::error::Result;
use crate::table::{MeshId, PackedLookupTable, SubMeshId};

/// A mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Object-space position.
    pub position: Point3,
    /// Object-space normal.
    pub normal: Vec3,
    /// Texture coordinates.
    pub tex_coords: Vec2,
}

impl Vertex {
    /// Vertex at `position` with zero normal and texture coordinates.
    pub fn at(position: Point3) -> Self {
        Self {
            position,
            normal: Vec3::zeros(),
            tex_coords: Vec2::zeros(),
        }
    }
}

/// A flat triangle list: every three consecutive vertices form a triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    /// Name used in diagnostics.
    pub name: String,
    /// Vertices, three per triangle.
    pub vertices: Vec<Vertex>,
}

impl SubMesh {
    /// Create a submesh.
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }

    /// Whole triangles in the vertex list.
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True if the vertex count is a multiple of 3.
    pub fn is_well_formed(&self) -> bool {
        self.vertices.len() % 3 == 0
    }

    /// Object-space bounds of the vertices.
    pub fn bounding_box(&self) -> Aabb3 {
        Aabb3::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

/// A named collection of submeshes with a cached object-space bounding box.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    sub_meshes: PackedLookupTable<SubMeshId, SubMesh>,
    bounding_box: Aabb3,
}

impl Mesh {
    /// Create a mesh from submeshes.
    pub fn new(name: impl Into<String>, sub_meshes: impl IntoIterator<Item = SubMesh>) -> Self {
        let mut mesh = Self {
            name: name.into(),
            sub_meshes: PackedLookupTable::new(),
            bounding_box: Aabb3::maximum_reversed(),
        };
        for sub_mesh in sub_meshes {
            mesh.add_sub_mesh(sub_mesh);
        }
        mesh
    }

    /// Axis-aligned box of size `width x height x depth` centred on the
    /// origin: one submesh, 12 triangles with outward normals.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let h = Vec3::new(width, height, depth) * 0.5;
        // (normal, u axis, v axis) per face; u x v = normal.
        let faces = [
            (Vec3::x(), Vec3::y(), Vec3::z()),
            (-Vec3::x(), Vec3::z(), Vec3::y()),
            (Vec3::y(), Vec3::z(), Vec3::x()),
            (-Vec3::y(), Vec3::x(), Vec3::z()),
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), Vec3::y(), Vec3::x()),
        ];

        let mut vertices = Vec::with_capacity(36);
        for (n, u, v) in faces {
            let corner = |su: f32, sv: f32, uv: Vec2| Vertex {
                position: Point3::from((n + u * su + v * sv).component_mul(&h)),
                normal: n,
                tex_coords: uv,
            };
            let c00 = corner(-1.0, -1.0, Vec2::new(0.0, 0.0));
            let c10 = corner(1.0, -1.0, Vec2::new(1.0, 0.0));
            let c11 = corner(1.0, 1.0, Vec2::new(1.0, 1.0));
            let c01 = corner(-1.0, 1.0, Vec2::new(0.0, 1.0));
            vertices.extend_from_slice(&[c00, c10, c11, c00, c11, c01]);
        }

        Self::new("cuboid", [SubMesh::new("cuboid", vertices)])
    }

    /// Mesh name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submeshes in insertion order.
    pub fn sub_meshes(&self) -> &PackedLookupTable<SubMeshId, SubMesh> {
        &self.sub_meshes
    }

    /// Add a submesh and grow the bounding box.
    pub fn add_sub_mesh(&mut self, sub_mesh: SubMesh) -> SubMeshId {
        self.bounding_box = self.bounding_box.union(&sub_mesh.bounding_box());
        self.sub_meshes.insert(sub_mesh)
    }

    /// Object-space bounding box; inverted for a mesh without vertices.
    pub fn bounding_box(&self) -> &Aabb3 {
        &self.bounding_box
    }

    /// Total triangle count over all submeshes.
    pub fn triangle_count(&self) -> usize {
        self.sub_meshes.values().iter().map(SubMesh::triangle_count).sum()
    }
}

/// Mesh storage the scene resolves instance meshes against.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    /// Meshes by ID.
    pub meshes: PackedLookupTable<MeshId, Mesh>,
}

impl ResourcePool {
    /// Empty pool sized from the capacity hints.
    pub fn new(capacity: &TableCapacity) -> Self {
        Self {
            meshes: PackedLookupTable::with_capacity(capacity.meshes),
        }
    }

    /// Store a mesh.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Resolve a mesh ID.
    pub fn mesh(&self, id: MeshId) -> Result<&Mesh> {
        self.meshes.get(id)
    }
}
