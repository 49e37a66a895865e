//! The scene: entity tables plus the static geometry structures built from them.

use std::sync::{Arc, Weak};

use ember_math::{Aabb3, Ray};
use ember_octree::{OctreeHit, SparseOctree};
use ember_raytrace::{Hit, TriangleRayTracer};

use crate::config::SceneConfig;
use crate::error::{Result, SceneError};
use crate::extract::{self, MeshTriangleRef};
use crate::instance::MeshInstance;
use crate::light::{DirectionalLight, LightProbe, PointLight};
use crate::mesh::ResourcePool;
use crate::surfel::{
    DiffuseLightProbe, Surfel, SurfelCluster, SurfelClusterProjection, SurfelGBuffer,
};
use crate::table::{
    DirectionalLightId, LightProbeId, MeshInstanceId, PackedLookupTable, PointLightId, SubMeshId,
};
use crate::view::{Camera, Skybox};

/// Octree over static triangles.
pub type StaticGeometryOctree = SparseOctree<MeshTriangleRef>;

/// Whether a static geometry structure has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Never built.
    Unbuilt,
    /// Built from the static instances present at the last build.
    Built,
}

/// Build state of both static geometry structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGeometryState {
    /// The octree.
    pub octree: BuildState,
    /// The ray tracer.
    pub raytracer: BuildState,
}

/// Ray tracer over static triangles, with the source of every triangle.
#[derive(Debug)]
pub struct StaticRayTracer {
    tracer: TriangleRayTracer,
    sources: Vec<(MeshInstanceId, SubMeshId)>,
}

impl StaticRayTracer {
    /// The underlying acceleration structure.
    pub fn tracer(&self) -> &TriangleRayTracer {
        &self.tracer
    }

    /// Instance and submesh the `triangle_index` of a [`Hit`] came from.
    pub fn source(&self, triangle_index: usize) -> Option<(MeshInstanceId, SubMeshId)> {
        self.sources.get(triangle_index).copied()
    }
}

/// Scene state: lights, mesh instances, probes, surfels and the static
/// geometry structures.
///
/// Instances are classified as static or dynamic. Only static instances feed
/// the octree and the ray tracer, and those are rebuilt wholesale on request.
/// Each build happens off to the side and the new structure replaces the
/// old `Arc` only on success, so readers holding the old one are unaffected.
#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,

    directional_lights: PackedLookupTable<DirectionalLightId, DirectionalLight>,
    point_lights: PackedLookupTable<PointLightId, PointLight>,
    mesh_instances: PackedLookupTable<MeshInstanceId, MeshInstance>,
    light_probes: PackedLookupTable<LightProbeId, LightProbe>,

    static_mesh_instance_ids: Vec<MeshInstanceId>,
    dynamic_mesh_instance_ids: Vec<MeshInstanceId>,

    bounding_box: Aabb3,
    light_baking_volume: Aabb3,

    camera: Weak<Camera>,
    skybox: Weak<Skybox>,

    octree: Option<Arc<StaticGeometryOctree>>,
    raytracer: Option<Arc<StaticRayTracer>>,

    surfels: Vec<Surfel>,
    surfel_clusters: Vec<SurfelCluster>,
    surfel_cluster_projections: Vec<SurfelClusterProjection>,
    diffuse_light_probes: Vec<DiffuseLightProbe>,
    surfel_gbuffer: Option<Arc<SurfelGBuffer>>,
}

impl Scene {
    /// Empty scene. Fails if `config` is out of range.
    pub fn new(config: SceneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: SceneConfig) -> Self {
        let cap = &config.capacity;
        Self {
            directional_lights: PackedLookupTable::with_capacity(cap.directional_lights),
            point_lights: PackedLookupTable::with_capacity(cap.point_lights),
            mesh_instances: PackedLookupTable::with_capacity(cap.mesh_instances),
            light_probes: PackedLookupTable::with_capacity(cap.light_probes),
            static_mesh_instance_ids: Vec::new(),
            dynamic_mesh_instance_ids: Vec::new(),
            bounding_box: Aabb3::maximum_reversed(),
            light_baking_volume: Aabb3::maximum_reversed(),
            camera: Weak::new(),
            skybox: Weak::new(),
            octree: None,
            raytracer: None,
            surfels: Vec::new(),
            surfel_clusters: Vec::new(),
            surfel_cluster_projections: Vec::new(),
            diffuse_light_probes: Vec::new(),
            surfel_gbuffer: None,
            config,
        }
    }

    /// Configuration the scene was created with.
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // Entity tables

    /// Directional lights.
    pub fn directional_lights(&self) -> &PackedLookupTable<DirectionalLightId, DirectionalLight> {
        &self.directional_lights
    }

    /// Directional lights, mutable.
    pub fn directional_lights_mut(
        &mut self,
    ) -> &mut PackedLookupTable<DirectionalLightId, DirectionalLight> {
        &mut self.directional_lights
    }

    /// Point lights.
    pub fn point_lights(&self) -> &PackedLookupTable<PointLightId, PointLight> {
        &self.point_lights
    }

    /// Point lights, mutable.
    pub fn point_lights_mut(&mut self) -> &mut PackedLookupTable<PointLightId, PointLight> {
        &mut self.point_lights
    }

    /// Light probes.
    pub fn light_probes(&self) -> &PackedLookupTable<LightProbeId, LightProbe> {
        &self.light_probes
    }

    /// Light probes, mutable.
    pub fn light_probes_mut(&mut self) -> &mut PackedLookupTable<LightProbeId, LightProbe> {
        &mut self.light_probes
    }

    /// All mesh instances, static and dynamic.
    pub fn mesh_instances(&self) -> &PackedLookupTable<MeshInstanceId, MeshInstance> {
        &self.mesh_instances
    }

    /// Mutable access to an instance, e.g. to move it.
    ///
    /// Moving a static instance leaves the static structures stale until
    /// they are rebuilt.
    pub fn mesh_instance_mut(&mut self, id: MeshInstanceId) -> Result<&mut MeshInstance> {
        self.mesh_instances.get_mut(id)
    }

    /// Store an instance without classifying it. It counts towards the
    /// bounding box but feeds no static structure until classified.
    pub fn insert_mesh_instance(&mut self, instance: MeshInstance) -> MeshInstanceId {
        self.mesh_instances.insert(instance)
    }

    /// Store an instance and classify it as static.
    pub fn add_static_mesh_instance(&mut self, instance: MeshInstance) -> MeshInstanceId {
        let id = self.mesh_instances.insert(instance);
        self.static_mesh_instance_ids.push(id);
        id
    }

    /// Store an instance and classify it as dynamic.
    pub fn add_dynamic_mesh_instance(&mut self, instance: MeshInstance) -> MeshInstanceId {
        let id = self.mesh_instances.insert(instance);
        self.dynamic_mesh_instance_ids.push(id);
        id
    }

    /// Classify a stored instance as static, moving it out of the dynamic list.
    pub fn add_mesh_instance_with_id_as_static(&mut self, id: MeshInstanceId) -> Result<()> {
        self.mesh_instances.get(id)?;
        self.dynamic_mesh_instance_ids.retain(|&d| d != id);
        if !self.static_mesh_instance_ids.contains(&id) {
            self.static_mesh_instance_ids.push(id);
        }
        Ok(())
    }

    /// Classify a stored instance as dynamic, moving it out of the static list.
    pub fn add_mesh_instance_with_id_as_dynamic(&mut self, id: MeshInstanceId) -> Result<()> {
        self.mesh_instances.get(id)?;
        self.static_mesh_instance_ids.retain(|&s| s != id);
        if !self.dynamic_mesh_instance_ids.contains(&id) {
            self.dynamic_mesh_instance_ids.push(id);
        }
        Ok(())
    }

    /// Remove an instance and drop it from the static and dynamic lists.
    pub fn remove_mesh_instance(&mut self, id: MeshInstanceId) -> Result<MeshInstance> {
        let instance = self.mesh_instances.remove(id)?;
        self.static_mesh_instance_ids.retain(|&s| s != id);
        self.dynamic_mesh_instance_ids.retain(|&d| d != id);
        Ok(instance)
    }

    /// Static instance IDs in classification order.
    pub fn static_mesh_instance_ids(&self) -> &[MeshInstanceId] {
        &self.static_mesh_instance_ids
    }

    /// Dynamic instance IDs in classification order.
    pub fn dynamic_mesh_instance_ids(&self) -> &[MeshInstanceId] {
        &self.dynamic_mesh_instance_ids
    }

    // View

    /// Point the scene at an externally owned camera.
    pub fn set_camera(&mut self, camera: &Arc<Camera>) {
        self.camera = Arc::downgrade(camera);
    }

    /// The camera, if one was set and is still alive.
    pub fn camera(&self) -> Option<Arc<Camera>> {
        self.camera.upgrade()
    }

    /// Point the scene at an externally owned skybox.
    pub fn set_skybox(&mut self, skybox: &Arc<Skybox>) {
        self.skybox = Arc::downgrade(skybox);
    }

    /// The skybox, if one was set and is still alive.
    pub fn skybox(&self) -> Option<Arc<Skybox>> {
        self.skybox.upgrade()
    }

    // Bounds

    /// Recompute the scene box as the union of every instance box and reset
    /// the light baking volume to it. An empty scene yields an inverted box.
    pub fn calculate_bounding_box(&mut self) -> Aabb3 {
        self.bounding_box = self
            .mesh_instances
            .values()
            .iter()
            .fold(Aabb3::maximum_reversed(), |acc, i| acc.union(i.bounding_box()));
        self.light_baking_volume = self.bounding_box;
        log::debug!("scene bounding box {:?}", self.bounding_box);
        self.bounding_box
    }

    /// Box from the last [`Scene::calculate_bounding_box`]; check
    /// [`Aabb3::is_inverted`] before using it.
    pub fn bounding_box(&self) -> &Aabb3 {
        &self.bounding_box
    }

    /// Volume light baking samples.
    pub fn light_baking_volume(&self) -> &Aabb3 {
        &self.light_baking_volume
    }

    /// Override the light baking volume until the next bounding box update.
    pub fn set_light_baking_volume(&mut self, volume: Aabb3) {
        self.light_baking_volume = volume;
    }

    // Static geometry

    /// Rebuild the octree from the current static instances.
    ///
    /// The root covers the scene bounding box grown to enclose every static
    /// triangle. On error the previously built octree stays installed.
    pub fn build_static_geometry_octree(&mut self, resources: &ResourcePool) -> Result<()> {
        let refs = extract::extract_triangle_refs(
            &self.mesh_instances,
            &self.static_mesh_instance_ids,
            resources,
            self.config.malformed_geometry,
        )?;

        let bounds = refs
            .iter()
            .fold(self.bounding_box, |acc, r| acc.union(&r.triangle.aabb()));

        let mut octree = SparseOctree::new(
            bounds,
            self.config.octree_depth,
            |r: &MeshTriangleRef, aabb: &Aabb3| aabb.contains_triangle(&r.triangle),
            |r: &MeshTriangleRef, ray: &Ray| r.triangle.intersect_ray(ray),
        )
        .with_max_straddle(self.config.octree_max_straddle);

        for r in refs {
            octree.insert(r);
        }

        let stats = octree.stats();
        log::info!(
            "built static geometry octree: {} triangles, {} stored, {} nodes, depth {}",
            stats.inserted_items,
            stats.stored_items,
            stats.node_count,
            stats.depth_reached
        );
        self.octree = Some(Arc::new(octree));
        Ok(())
    }

    /// Rebuild the ray tracer from the current static instances. On error the
    /// previously built ray tracer stays installed.
    pub fn build_static_geometry_raytracer(&mut self, resources: &ResourcePool) -> Result<()> {
        let refs = extract::extract_triangle_refs(
            &self.mesh_instances,
            &self.static_mesh_instance_ids,
            resources,
            self.config.malformed_geometry,
        )?;

        let triangles: Vec<_> = refs.iter().map(|r| r.triangle).collect();
        let tracer = TriangleRayTracer::build(&triangles)?;
        let sources = refs
            .iter()
            .map(|r| (r.mesh_instance_id, r.sub_mesh_id))
            .collect();

        log::info!(
            "built static geometry ray tracer: {} triangles",
            tracer.triangle_count()
        );
        self.raytracer = Some(Arc::new(StaticRayTracer { tracer, sources }));
        Ok(())
    }

    /// The installed octree, if built.
    pub fn static_geometry_octree(&self) -> Option<Arc<StaticGeometryOctree>> {
        self.octree.clone()
    }

    /// The installed ray tracer, if built.
    pub fn static_geometry_raytracer(&self) -> Option<Arc<StaticRayTracer>> {
        self.raytracer.clone()
    }

    /// Build state of both static structures.
    pub fn static_geometry_state(&self) -> StaticGeometryState {
        let state = |built: bool| {
            if built {
                BuildState::Built
            } else {
                BuildState::Unbuilt
            }
        };
        StaticGeometryState {
            octree: state(self.octree.is_some()),
            raytracer: state(self.raytracer.is_some()),
        }
    }

    /// Nearest static triangle along `ray` via the octree; `None` if unbuilt.
    pub fn raycast_static_octree(
        &self,
        ray: &Ray,
    ) -> Result<Option<OctreeHit<'_, MeshTriangleRef>>> {
        check_ray(ray)?;
        Ok(self.octree.as_deref().and_then(|octree| octree.raycast(ray)))
    }

    /// Nearest static triangle along `ray` via the ray tracer; `None` if unbuilt.
    pub fn raycast_static_raytracer(&self, ray: &Ray) -> Result<Option<Hit>> {
        check_ray(ray)?;
        match &self.raytracer {
            Some(rt) => Ok(rt.tracer.intersect(ray)?),
            None => Ok(None),
        }
    }

    // Surfels

    /// Surfels from the last bake.
    pub fn surfels(&self) -> &[Surfel] {
        &self.surfels
    }

    /// Surfels, mutable.
    pub fn surfels_mut(&mut self) -> &mut Vec<Surfel> {
        &mut self.surfels
    }

    /// Surfel clusters.
    pub fn surfel_clusters(&self) -> &[SurfelCluster] {
        &self.surfel_clusters
    }

    /// Surfel clusters, mutable.
    pub fn surfel_clusters_mut(&mut self) -> &mut Vec<SurfelCluster> {
        &mut self.surfel_clusters
    }

    /// Cluster projections.
    pub fn surfel_cluster_projections(&self) -> &[SurfelClusterProjection] {
        &self.surfel_cluster_projections
    }

    /// Cluster projections, mutable.
    pub fn surfel_cluster_projections_mut(&mut self) -> &mut Vec<SurfelClusterProjection> {
        &mut self.surfel_cluster_projections
    }

    /// Diffuse light probes.
    pub fn diffuse_light_probes(&self) -> &[DiffuseLightProbe] {
        &self.diffuse_light_probes
    }

    /// Diffuse light probes, mutable.
    pub fn diffuse_light_probes_mut(&mut self) -> &mut Vec<DiffuseLightProbe> {
        &mut self.diffuse_light_probes
    }

    fn validate_cluster_ranges(&self) -> Result<()> {
        for (i, cluster) in self.surfel_clusters.iter().enumerate() {
            let range = cluster.range();
            if range.end > self.surfels.len() {
                return Err(SceneError::InvalidSurfelLink(format!(
                    "cluster {i} covers surfels {range:?} but only {} exist",
                    self.surfels.len()
                )));
            }
        }
        Ok(())
    }

    /// Check that clusters, projections and probes only point inside their
    /// target lists.
    pub fn validate_surfel_links(&self) -> Result<()> {
        self.validate_cluster_ranges()?;
        for (i, projection) in self.surfel_cluster_projections.iter().enumerate() {
            if projection.surfel_cluster_index >= self.surfel_clusters.len() {
                return Err(SceneError::InvalidSurfelLink(format!(
                    "projection {i} refers to cluster {} but only {} exist",
                    projection.surfel_cluster_index,
                    self.surfel_clusters.len()
                )));
            }
        }
        for (i, probe) in self.diffuse_light_probes.iter().enumerate() {
            let end = probe.projection_offset.saturating_add(probe.projection_count);
            if end > self.surfel_cluster_projections.len() {
                return Err(SceneError::InvalidSurfelLink(format!(
                    "probe {i} covers projections {}..{end} but only {} exist",
                    probe.projection_offset,
                    self.surfel_cluster_projections.len()
                )));
            }
        }
        Ok(())
    }

    /// Pack the surfels into a fresh GBuffer and install it.
    ///
    /// Every cluster range must lie inside the surfel list. Projection and
    /// probe links are left to [`Scene::validate_surfel_links`].
    pub fn pack_surfels_to_gbuffer(&mut self) -> Result<()> {
        self.validate_cluster_ranges()?;
        let gbuffer = SurfelGBuffer::pack(&self.surfels)?;
        log::info!("packed {} surfels into gbuffer", gbuffer.rows());
        self.surfel_gbuffer = Some(Arc::new(gbuffer));
        Ok(())
    }

    /// The installed surfel GBuffer, if packed.
    pub fn surfel_gbuffer(&self) -> Option<Arc<SurfelGBuffer>> {
        self.surfel_gbuffer.clone()
    }
}

fn check_ray(ray: &Ray) -> Result<()> {
    if ray.is_finite() {
        Ok(())
    } else {
        Err(SceneError::QueryFailed(
            "ray origin or direction is not finite".into(),
        ))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::from_config(SceneConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MalformedGeometryPolicy;
    use crate::mesh::{Mesh, SubMesh, Vertex};
    use crate::table::MeshId;
    use ember_math::{Point3, Transform, Vec2, Vec3};

    fn unit_cube() -> (ResourcePool, MeshId) {
        let mut pool = ResourcePool::default();
        let id = pool.add_mesh(Mesh::cuboid(1.0, 1.0, 1.0));
        (pool, id)
    }

    fn placed(pool: &ResourcePool, mesh_id: MeshId, x: f32, y: f32) -> MeshInstance {
        MeshInstance::new(mesh_id, pool)
            .unwrap()
            .with_transform(Transform::translation(x, y, 0.0))
    }

    fn down_ray(x: f32, y: f32) -> Ray {
        Ray::from_points(Point3::new(x, y, 5.0), Point3::new(x, y, -5.0))
    }

    #[test]
    fn test_empty_scene_box_is_inverted() {
        let mut scene = Scene::default();
        assert!(scene.calculate_bounding_box().is_inverted());
        assert!(scene.light_baking_volume().is_inverted());
    }

    #[test]
    fn test_bounding_box_is_union_of_instances() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.add_dynamic_mesh_instance(placed(&pool, mesh_id, 3.0, -2.0));

        let bb = scene.calculate_bounding_box();
        assert!((bb.min - Point3::new(-0.5, -2.5, -0.5)).norm() < 1e-6);
        assert!((bb.max - Point3::new(3.5, 0.5, 0.5)).norm() < 1e-6);
        assert_eq!(*scene.light_baking_volume(), bb);
    }

    #[test]
    fn test_light_baking_volume_override() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();

        let custom = Aabb3::new(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        scene.set_light_baking_volume(custom);
        assert_eq!(*scene.light_baking_volume(), custom);
        assert_ne!(*scene.bounding_box(), custom);
    }

    #[test]
    fn test_unit_cube_octree_hit() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        let id = scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();

        let hit = scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);
        assert_eq!(hit.item.mesh_instance_id, id);
        assert_eq!(scene.static_geometry_octree().unwrap().len(), 12);
    }

    #[test]
    fn test_unit_cube_raytracer_hit() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        let id = scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.build_static_geometry_raytracer(&pool).unwrap();

        let hit = scene
            .raycast_static_raytracer(&down_ray(0.0, 0.0))
            .unwrap()
            .unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);
        let rt = scene.static_geometry_raytracer().unwrap();
        assert_eq!(rt.source(hit.triangle_index).map(|(i, _)| i), Some(id));
    }

    #[test]
    fn test_rebuild_picks_up_new_static_instance() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();

        let moved = scene.add_static_mesh_instance(
            placed(&pool, mesh_id, 5.0, 0.0),
        );
        let ray = down_ray(5.0, 0.0);
        assert!(scene.raycast_static_octree(&ray).unwrap().is_none());
        assert!(scene.raycast_static_raytracer(&ray).unwrap().is_none());

        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();

        let hit = scene.raycast_static_octree(&ray).unwrap().unwrap();
        assert_eq!(hit.item.mesh_instance_id, moved);
        assert!((hit.distance - 4.5).abs() < 1e-4);
        let hit = scene.raycast_static_raytracer(&ray).unwrap().unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_octree_root_covers_geometry_without_bounds_update() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 8.0));
        scene.build_static_geometry_octree(&pool).unwrap();
        assert!(scene.raycast_static_octree(&down_ray(0.0, 8.0)).unwrap().is_some());
    }

    #[test]
    fn test_dynamic_instances_are_excluded() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_dynamic_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();

        assert!(scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().is_none());
        assert!(scene
            .raycast_static_raytracer(&down_ray(0.0, 0.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_static_set_builds() {
        let pool = ResourcePool::default();
        let mut scene = Scene::default();
        assert_eq!(
            scene.static_geometry_state(),
            StaticGeometryState {
                octree: BuildState::Unbuilt,
                raytracer: BuildState::Unbuilt,
            }
        );
        assert!(scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().is_none());

        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();
        assert_eq!(
            scene.static_geometry_state(),
            StaticGeometryState {
                octree: BuildState::Built,
                raytracer: BuildState::Built,
            }
        );
        assert!(scene.static_geometry_octree().unwrap().is_empty());
        assert!(scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().is_none());
        assert!(scene
            .raycast_static_raytracer(&down_ray(0.0, 0.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failed_build_keeps_previous_structures() {
        let (mut pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();
        let octree_before = scene.static_geometry_octree().unwrap();
        let tracer_before = scene.static_geometry_raytracer().unwrap();

        let mut broken = Mesh::cuboid(1.0, 1.0, 1.0);
        broken.add_sub_mesh(SubMesh::new("torn", vec![Vertex::at(Point3::origin()); 2]));
        let broken_id = pool.add_mesh(broken);
        scene.add_static_mesh_instance(placed(&pool, broken_id, 5.0, 0.0));

        assert!(matches!(
            scene.build_static_geometry_octree(&pool),
            Err(SceneError::MalformedGeometry { .. })
        ));
        assert!(matches!(
            scene.build_static_geometry_raytracer(&pool),
            Err(SceneError::MalformedGeometry { .. })
        ));

        let octree_after = scene.static_geometry_octree().unwrap();
        assert!(Arc::ptr_eq(&octree_before, &octree_after));
        assert!(scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().is_some());
        assert!(scene.raycast_static_octree(&down_ray(5.0, 0.0)).unwrap().is_none());

        let tracer_after = scene.static_geometry_raytracer().unwrap();
        assert!(Arc::ptr_eq(&tracer_before, &tracer_after));
        let hit = scene
            .raycast_static_raytracer(&down_ray(0.0, 0.0))
            .unwrap()
            .unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);
        assert!(scene
            .raycast_static_raytracer(&down_ray(5.0, 0.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_non_finite_vertices_fail_raytracer_build() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.build_static_geometry_raytracer(&pool).unwrap();
        let before = scene.static_geometry_raytracer().unwrap();

        scene.add_static_mesh_instance(
            MeshInstance::new(mesh_id, &pool)
                .unwrap()
                .with_transform(Transform::translation(f32::NAN, 0.0, 0.0)),
        );
        assert!(matches!(
            scene.build_static_geometry_raytracer(&pool),
            Err(SceneError::BuildFailed(_))
        ));

        let after = scene.static_geometry_raytracer().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.tracer().triangle_count(), 12);
        let hit = scene
            .raycast_static_raytracer(&down_ray(0.0, 0.0))
            .unwrap()
            .unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_non_finite_ray_fails_both_queries() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        let bad = Ray::new(Point3::new(f32::NAN, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));

        // Rejected before anything is built, too.
        assert!(matches!(
            scene.raycast_static_octree(&bad),
            Err(SceneError::QueryFailed(_))
        ));
        assert!(matches!(
            scene.raycast_static_raytracer(&bad),
            Err(SceneError::QueryFailed(_))
        ));

        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();
        assert!(matches!(
            scene.raycast_static_octree(&bad),
            Err(SceneError::QueryFailed(_))
        ));
        assert!(matches!(
            scene.raycast_static_raytracer(&bad),
            Err(SceneError::QueryFailed(_))
        ));
    }

    #[test]
    fn test_octree_duplication_bounded_at_max_depth() {
        let mut pool = ResourcePool::default();
        let slab = pool.add_mesh(Mesh::cuboid(20.0, 0.1, 20.0));
        let config = SceneConfig {
            octree_depth: crate::config::MAX_OCTREE_DEPTH,
            ..Default::default()
        };
        let mut scene = Scene::new(config).unwrap();
        scene.add_static_mesh_instance(placed(&pool, slab, 0.0, 0.0));
        scene.add_static_mesh_instance(placed(&pool, slab, 0.0, 3.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();

        let octree = scene.static_geometry_octree().unwrap();
        let stats = octree.stats();
        let max_straddle = scene.config().octree_max_straddle;
        assert_eq!(stats.inserted_items, 24);
        assert!(stats.stored_items <= 24 * max_straddle);
        assert!(stats.node_count <= 1 + 24 * max_straddle * usize::from(octree.max_depth()));

        let from_above =
            Ray::from_points(Point3::new(2.0, 10.0, 1.0), Point3::new(2.0, -10.0, 1.0));
        let hit = scene.raycast_static_octree(&from_above).unwrap().unwrap();
        assert!((hit.distance - (10.0 - 3.05)).abs() < 1e-3);
    }

    #[test]
    fn test_skip_policy_builds_around_malformed_submesh() {
        let mut pool = ResourcePool::default();
        let mut mesh = Mesh::cuboid(1.0, 1.0, 1.0);
        mesh.add_sub_mesh(SubMesh::new("torn", vec![Vertex::at(Point3::origin()); 4]));
        let mesh_id = pool.add_mesh(mesh);

        let config = SceneConfig {
            malformed_geometry: MalformedGeometryPolicy::Skip,
            ..Default::default()
        };
        let mut scene = Scene::new(config).unwrap();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        scene.build_static_geometry_raytracer(&pool).unwrap();

        assert_eq!(scene.static_geometry_octree().unwrap().len(), 12);
        let rt = scene.static_geometry_raytracer().unwrap();
        assert_eq!(rt.tracer().triangle_count(), 12);
    }

    #[test]
    fn test_old_structure_survives_rebuild_for_readers() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        scene.add_static_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        scene.calculate_bounding_box();
        scene.build_static_geometry_octree(&pool).unwrap();
        let reader = scene.static_geometry_octree().unwrap();

        let ids: Vec<_> = scene.static_mesh_instance_ids().to_vec();
        for id in ids {
            scene.remove_mesh_instance(id).unwrap();
        }
        scene.build_static_geometry_octree(&pool).unwrap();

        assert!(reader.raycast(&down_ray(0.0, 0.0)).is_some());
        assert!(scene.raycast_static_octree(&down_ray(0.0, 0.0)).unwrap().is_none());
    }

    #[test]
    fn test_reclassify_and_remove() {
        let (pool, mesh_id) = unit_cube();
        let mut scene = Scene::default();
        let id = scene.insert_mesh_instance(placed(&pool, mesh_id, 0.0, 0.0));
        assert!(scene.static_mesh_instance_ids().is_empty());

        scene.add_mesh_instance_with_id_as_static(id).unwrap();
        scene.add_mesh_instance_with_id_as_static(id).unwrap();
        assert_eq!(scene.static_mesh_instance_ids(), &[id]);

        scene.add_mesh_instance_with_id_as_dynamic(id).unwrap();
        assert!(scene.static_mesh_instance_ids().is_empty());
        assert_eq!(scene.dynamic_mesh_instance_ids(), &[id]);

        scene.remove_mesh_instance(id).unwrap();
        assert!(scene.dynamic_mesh_instance_ids().is_empty());
        assert!(matches!(
            scene.add_mesh_instance_with_id_as_static(id),
            Err(SceneError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_camera_and_skybox_are_not_owned() {
        let mut scene = Scene::default();
        let camera = Arc::new(Camera::looking_at(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
        ));
        let skybox = Arc::new(Skybox {
            texture: "sky.hdr".into(),
        });
        scene.set_camera(&camera);
        scene.set_skybox(&skybox);
        assert!(scene.camera().is_some());
        assert_eq!(Arc::strong_count(&camera), 1);

        drop(camera);
        assert!(scene.camera().is_none());
        assert_eq!(scene.skybox().unwrap().texture, skybox.texture);
    }

    fn surfel(i: f32) -> Surfel {
        Surfel {
            position: Point3::new(i, 2.0 * i, 3.0 * i),
            normal: Vec3::new(0.0, 0.0, 1.0),
            albedo: Vec3::new(i / 4.0, 0.5, 0.25),
            uv: Vec2::new(i / 3.0, 1.0 - i / 3.0),
        }
    }

    #[test]
    fn test_pack_three_surfels() {
        use crate::surfel::SurfelChannel;

        let mut scene = Scene::default();
        scene
            .surfels_mut()
            .extend([surfel(1.0), surfel(2.0), surfel(3.0)]);
        scene.surfel_clusters_mut().push(SurfelCluster {
            surfel_offset: 0,
            surfel_count: 3,
            center: Point3::new(2.0, 4.0, 6.0),
        });
        scene.pack_surfels_to_gbuffer().unwrap();

        let gbuffer = scene.surfel_gbuffer().unwrap();
        assert_eq!(gbuffer.rows(), 3);
        let second = surfel(2.0);
        assert_eq!(
            gbuffer.texel(SurfelChannel::Position, 1).unwrap(),
            [2.0, 4.0, 6.0]
        );
        assert_eq!(
            gbuffer.texel(SurfelChannel::Normal, 1).unwrap(),
            [0.0, 0.0, 1.0]
        );
        assert_eq!(
            gbuffer.texel(SurfelChannel::Albedo, 1).unwrap(),
            [second.albedo.x, second.albedo.y, second.albedo.z]
        );
        assert_eq!(
            gbuffer.texel(SurfelChannel::Uv, 1).unwrap(),
            [second.uv.x, second.uv.y, 0.0]
        );
    }

    #[test]
    fn test_pack_without_surfels() {
        let mut scene = Scene::default();
        scene.pack_surfels_to_gbuffer().unwrap();
        assert!(scene.surfel_gbuffer().unwrap().is_empty());
    }

    #[test]
    fn test_pack_rejects_cluster_outside_surfels() {
        let mut scene = Scene::default();
        scene.surfels_mut().push(surfel(1.0));
        scene.surfel_clusters_mut().push(SurfelCluster {
            surfel_offset: 0,
            surfel_count: 2,
            center: Point3::origin(),
        });
        assert!(matches!(
            scene.pack_surfels_to_gbuffer(),
            Err(SceneError::InvalidSurfelLink(_))
        ));
        assert!(scene.surfel_gbuffer().is_none());

        scene.surfel_clusters_mut()[0].surfel_count = 1;
        scene.pack_surfels_to_gbuffer().unwrap();
        assert_eq!(scene.surfel_gbuffer().unwrap().rows(), 1);
    }

    #[test]
    fn test_projection_and_probe_links_do_not_block_packing() {
        let mut scene = Scene::default();
        scene.surfels_mut().push(surfel(1.0));
        scene.surfel_clusters_mut().push(SurfelCluster {
            surfel_offset: 0,
            surfel_count: 1,
            center: Point3::origin(),
        });
        scene
            .surfel_cluster_projections_mut()
            .push(SurfelClusterProjection {
                surfel_cluster_index: 1,
                spherical_harmonics: [Vec3::zeros(); 4],
            });
        assert!(matches!(
            scene.validate_surfel_links(),
            Err(SceneError::InvalidSurfelLink(_))
        ));
        scene.pack_surfels_to_gbuffer().unwrap();
        assert_eq!(scene.surfel_gbuffer().unwrap().rows(), 1);

        scene.surfel_cluster_projections_mut()[0].surfel_cluster_index = 0;
        scene.diffuse_light_probes_mut().push(DiffuseLightProbe {
            position: Point3::origin(),
            projection_offset: 0,
            projection_count: 2,
        });
        assert!(scene.validate_surfel_links().is_err());
        scene.pack_surfels_to_gbuffer().unwrap();

        scene.diffuse_light_probes_mut()[0].projection_count = 1;
        scene.validate_surfel_links().unwrap();
    }

    #[test]
    fn test_lights_and_probes_tables() {
        let mut scene = Scene::default();
        let sun = scene
            .directional_lights_mut()
            .insert(DirectionalLight::default());
        let lamp = scene.point_lights_mut().insert(PointLight {
            position: Point3::new(0.0, 3.0, 0.0),
            ..Default::default()
        });
        scene.light_probes_mut().insert(LightProbe {
            position: Point3::origin(),
        });

        assert_eq!(scene.directional_lights().len(), 1);
        assert!((scene.point_lights()[lamp].position.y - 3.0).abs() < 1e-6);
        scene.directional_lights_mut().remove(sun).unwrap();
        assert!(scene.directional_lights().get(sun).is_err());
        assert_eq!(scene.light_probes().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SceneConfig {
            octree_depth: 40,
            ..Default::default()
        };
        assert!(matches!(Scene::new(config), Err(SceneError::Config(_))));
    }
}
