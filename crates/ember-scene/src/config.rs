//! Scene configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

/// Deepest octree the scene will build.
pub const MAX_OCTREE_DEPTH: u8 = 16;

/// What a static geometry build does with a submesh whose vertex count is
/// not a multiple of 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedGeometryPolicy {
    /// Abort the build; the previously installed structure stays in place.
    #[default]
    Fail,
    /// Log a warning, leave the submesh out and keep building.
    Skip,
}

/// Initial capacities for the scene's tables. These are allocation hints;
/// tables grow past them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCapacity {
    /// Directional lights.
    pub directional_lights: usize,
    /// Point lights.
    pub point_lights: usize,
    /// Mesh instances.
    pub mesh_instances: usize,
    /// Light probes.
    pub light_probes: usize,
    /// Meshes in a [`crate::ResourcePool`].
    pub meshes: usize,
}

impl Default for TableCapacity {
    fn default() -> Self {
        Self {
            directional_lights: 10,
            point_lights: 10,
            mesh_instances: 1000,
            light_probes: 10000,
            meshes: 64,
        }
    }
}

/// Scene configuration, usually read from the `[config]` table of a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Maximum subdivision depth of the static geometry octree.
    pub octree_depth: u8,
    /// Most octree nodes a single triangle may be stored in, across all depths.
    pub octree_max_straddle: usize,
    /// Handling of malformed submeshes during static geometry builds.
    pub malformed_geometry: MalformedGeometryPolicy,
    /// Table capacity hints.
    pub capacity: TableCapacity,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            octree_depth: 5,
            octree_max_straddle: ember_octree::DEFAULT_MAX_STRADDLE,
            malformed_geometry: MalformedGeometryPolicy::default(),
            capacity: TableCapacity::default(),
        }
    }
}

impl SceneConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SceneConfig =
            toml::from_str(s).map_err(|e| SceneError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SceneError::Config(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.octree_depth > MAX_OCTREE_DEPTH {
            return Err(SceneError::Config(format!(
                "octree_depth {} exceeds the maximum of {MAX_OCTREE_DEPTH}",
                self.octree_depth
            )));
        }
        if !(1..=8).contains(&self.octree_max_straddle) {
            return Err(SceneError::Config(format!(
                "octree_max_straddle must be within 1..=8, got {}",
                self.octree_max_straddle
            )));
        }
        Ok(())
    }
}
