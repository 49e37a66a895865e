//! Light sources and probes.

use ember_math::{Point3, Vec3};

/// Infinitely distant light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Linear RGB radiance.
    pub color: Vec3,
    /// Direction the light travels in.
    pub direction: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::repeat(1.0),
            direction: -Vec3::y(),
        }
    }
}

/// Omnidirectional light with a finite falloff radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World-space position.
    pub position: Point3,
    /// Linear RGB radiance.
    pub color: Vec3,
    /// Distance at which the contribution reaches zero.
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            color: Vec3::repeat(1.0),
            radius: 10.0,
        }
    }
}

/// Sample point for baked indirect lighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProbe {
    /// World-space position.
    pub position: Point3,
}
