//! Surfels and their GPU-side packing.
//!
//! Light baking samples scene surfaces into [`Surfel`]s, groups them into
//! [`SurfelCluster`]s and projects clusters onto [`DiffuseLightProbe`]s.
//! The lighting pass reads surfels from a [`SurfelGBuffer`]: four parallel
//! channels of RGB float texels, one row per surfel, channel order fixed by
//! [`SurfelChannel`].

use ember_math::{Point3, Vec2, Vec3};

use crate::error::{Result, SceneError};

/// A world-space surface sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surfel {
    /// World-space position.
    pub position: Point3,
    /// Unit surface normal.
    pub normal: Vec3,
    /// Linear RGB albedo.
    pub albedo: Vec3,
    /// Lightmap parameterization coordinate.
    pub uv: Vec2,
}

/// A contiguous run of surfels in the scene's surfel list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfelCluster {
    /// Index of the first surfel.
    pub surfel_offset: usize,
    /// Number of surfels.
    pub surfel_count: usize,
    /// Representative position.
    pub center: Point3,
}

impl SurfelCluster {
    /// Surfel index range covered by this cluster.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.surfel_offset..self.surfel_offset.saturating_add(self.surfel_count)
    }
}

/// Projection of a surfel cluster's radiance onto a probe's basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfelClusterProjection {
    /// Index into the scene's surfel clusters.
    pub surfel_cluster_index: usize,
    /// L1 spherical harmonics weights (one RGB triple per coefficient).
    pub spherical_harmonics: [Vec3; 4],
}

/// Probe gathering indirect diffuse light from a run of cluster projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffuseLightProbe {
    /// World-space position.
    pub position: Point3,
    /// Index of the first projection.
    pub projection_offset: usize,
    /// Number of projections.
    pub projection_count: usize,
}

/// GBuffer channels in the order the lighting shader samples them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfelChannel {
    /// World-space position.
    Position = 0,
    /// Unit normal.
    Normal = 1,
    /// Albedo.
    Albedo = 2,
    /// `(u, v, 0)`.
    Uv = 3,
}

impl SurfelChannel {
    /// All channels in layer order.
    pub const ALL: [SurfelChannel; 4] = [
        SurfelChannel::Position,
        SurfelChannel::Normal,
        SurfelChannel::Albedo,
        SurfelChannel::Uv,
    ];
}

/// Packed surfel attributes: `channel(c)[row]` for row `i` belongs to surfel `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfelGBuffer {
    channels: [Vec<[f32; 3]>; 4],
}

impl SurfelGBuffer {
    /// Pack `surfels` in order. An empty slice gives an empty buffer.
    pub fn pack(surfels: &[Surfel]) -> Result<Self> {
        let mut channels: [Vec<[f32; 3]>; 4] =
            std::array::from_fn(|_| Vec::with_capacity(surfels.len()));

        for (i, s) in surfels.iter().enumerate() {
            let rows: [[f32; 3]; 4] = [
                s.position.coords.into(),
                s.normal.into(),
                s.albedo.into(),
                [s.uv.x, s.uv.y, 0.0],
            ];
            if rows.iter().flatten().any(|c| !c.is_finite()) {
                return Err(SceneError::GBuffer(format!(
                    "surfel {i} has non-finite attributes"
                )));
            }
            for (channel, row) in channels.iter_mut().zip(rows) {
                channel.push(row);
            }
        }

        Ok(Self { channels })
    }

    /// Rows per channel (= surfel count).
    pub fn rows(&self) -> usize {
        self.channels[0].len()
    }

    /// True if no surfels were packed.
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Texels of one channel.
    pub fn channel(&self, channel: SurfelChannel) -> &[[f32; 3]] {
        &self.channels[channel as usize]
    }

    /// Single texel, or [`SceneError::GBuffer`] if `row` is out of range.
    pub fn texel(&self, channel: SurfelChannel, row: usize) -> Result<[f32; 3]> {
        self.channel(channel).get(row).copied().ok_or_else(|| {
            SceneError::GBuffer(format!("row {row} out of range ({} rows)", self.rows()))
        })
    }

    /// Raw bytes of one channel in native endianness, ready for a texture upload.
    pub fn channel_bytes(&self, channel: SurfelChannel) -> &[u8] {
        bytemuck::cast_slice(self.channel(channel))
    }
}
