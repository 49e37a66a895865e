//! Externally owned view state the scene refers to but never drops.

use std::path::PathBuf;

use ember_math::{Point3, Vec3};

/// Perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Eye position.
    pub position: Point3,
    /// Viewing direction.
    pub front: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub vertical_fov: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Camera {
    /// Camera at `position` looking at `target` with +y up.
    pub fn looking_at(position: Point3, target: Point3) -> Self {
        Self {
            position,
            front: target - position,
            up: Vec3::y(),
            vertical_fov: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Environment map drawn behind the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skybox {
    /// Path of the equirectangular or cube map source.
    pub texture: PathBuf,
}
