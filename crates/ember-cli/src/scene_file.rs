//! TOML scene descriptions.
//!
//! ```toml
//! [config]
//! octree_depth = 5
//!
//! [[mesh]]
//! name = "crate"
//! cuboid = [1.0, 1.0, 1.0]
//!
//! [[instance]]
//! mesh = "crate"
//! translation = [0.0, 0.0, 0.0]
//! rotation = [0.0, 0.0, 0.0]   # Euler XYZ, radians
//! scale = [1.0, 1.0, 1.0]
//! static = true
//!
//! [[surfel]]
//! position = [0.0, 0.5, 0.0]
//! normal = [0.0, 1.0, 0.0]
//! albedo = [0.8, 0.8, 0.8]
//! uv = [0.5, 0.5]
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ember_math::{Point3, Rotation, Transform, Vec2, Vec3};
use ember_scene::{
    DirectionalLight, Mesh, MeshId, MeshInstance, PointLight, ResourcePool, Scene, SceneConfig,
    Surfel,
};
use serde::Deserialize;

/// Root of a scene file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub config: SceneConfig,
    #[serde(rename = "mesh")]
    pub meshes: Vec<MeshDesc>,
    #[serde(rename = "instance")]
    pub instances: Vec<InstanceDesc>,
    #[serde(rename = "directional_light")]
    pub directional_lights: Vec<DirectionalLightDesc>,
    #[serde(rename = "point_light")]
    pub point_lights: Vec<PointLightDesc>,
    #[serde(rename = "surfel")]
    pub surfels: Vec<SurfelDesc>,
}

#[derive(Debug, Deserialize)]
pub struct MeshDesc {
    pub name: String,
    /// Box dimensions `[width, height, depth]`.
    pub cuboid: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub struct InstanceDesc {
    pub mesh: String,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default = "default_static", rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Deserialize)]
pub struct DirectionalLightDesc {
    pub color: [f32; 3],
    pub direction: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub struct PointLightDesc {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub radius: f32,
}

#[derive(Debug, Deserialize)]
pub struct SurfelDesc {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub albedo: [f32; 3],
    pub uv: [f32; 2],
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

fn default_static() -> bool {
    true
}

/// A scene together with the meshes its instances refer to.
pub struct LoadedScene {
    pub scene: Scene,
    pub resources: ResourcePool,
}

impl SceneFile {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Instantiate the described scene.
    pub fn build(self) -> Result<LoadedScene> {
        let mut scene = Scene::new(self.config)?;
        let mut resources = ResourcePool::new(&scene.config().capacity);

        let mut by_name: HashMap<String, MeshId> = HashMap::new();
        for desc in self.meshes {
            let [w, h, d] = desc.cuboid;
            let id = resources.add_mesh(Mesh::cuboid(w, h, d));
            by_name.insert(desc.name, id);
        }

        for desc in &self.instances {
            let mesh_id = by_name
                .get(&desc.mesh)
                .ok_or_else(|| anyhow!("instance refers to unknown mesh '{}'", desc.mesh))?;
            let [rx, ry, rz] = desc.rotation;
            let transform = Transform::from_trs(
                Vec3::from(desc.translation),
                Rotation::from_euler_angles(rx, ry, rz),
                Vec3::from(desc.scale),
            );
            let instance = MeshInstance::new(*mesh_id, &resources)?.with_transform(transform);
            if desc.is_static {
                scene.add_static_mesh_instance(instance);
            } else {
                scene.add_dynamic_mesh_instance(instance);
            }
        }

        for light in self.directional_lights {
            scene.directional_lights_mut().insert(DirectionalLight {
                color: light.color.into(),
                direction: light.direction.into(),
            });
        }
        for light in self.point_lights {
            scene.point_lights_mut().insert(PointLight {
                position: Point3::from(light.position),
                color: light.color.into(),
                radius: light.radius,
            });
        }

        scene.surfels_mut().extend(self.surfels.into_iter().map(|s| Surfel {
            position: Point3::from(s.position),
            normal: s.normal.into(),
            albedo: s.albedo.into(),
            uv: Vec2::from(s.uv),
        }));

        scene.calculate_bounding_box();
        Ok(LoadedScene { scene, resources })
    }
}
