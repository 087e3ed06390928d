use crate::enums::InterpolationOrder;
use crate::geometry::Geometry;
use crate::interpolator::Interpolator;
use crate::registration::RigidTransform;

use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{Array3, Zip};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Transform is not invertible")]
    SingularTransform,

    #[error("Volume is busy resampling")]
    VolumeBusy,

    #[error("No transform has been computed")]
    NoTransform,

    #[error("Resampling task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Affine map from destination voxel coordinates to source voxel
/// coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl VoxelTransform {
    /// Express the inverse of a physical transform in the voxel space of
    /// `geometry`.
    ///
    /// Physical coordinates are the centred ones of [`Geometry::mm_from_index`],
    /// so with `M` the index → mm map the voxel transform is `M⁻¹ · T⁻¹ · M`.
    pub fn from_physical(
        transform: &RigidTransform,
        geometry: &Geometry,
    ) -> Result<Self, ResampleError> {
        let inverse = transform
            .try_inverse()
            .ok_or(ResampleError::SingularTransform)?;

        let spacing = Vector3::from(geometry.spacing);
        let half_extent = Vector3::from(geometry.extent_mm()) / 2.0;

        let mut to_mm = Matrix4::from_diagonal(&spacing.push(1.0));
        to_mm.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-half_extent));

        let mut to_index = Matrix4::from_diagonal(&spacing.map(|s| 1.0 / s).push(1.0));
        to_index
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&half_extent.component_div(&spacing));

        let voxel = to_index * inverse.matrix() * to_mm;
        Ok(Self {
            rotation: voxel.fixed_view::<3, 3>(0, 0).into_owned(),
            translation: voxel.fixed_view::<3, 1>(0, 3).into_owned(),
        })
    }

    #[inline]
    pub fn apply(&self, coord: [f64; 3]) -> [f64; 3] {
        let mapped = self.rotation * Vector3::from(coord) + self.translation;
        [mapped.x, mapped.y, mapped.z]
    }
}

pub struct ResampleEngine;

impl ResampleEngine {
    /// Resample `source` onto its own grid: every destination voxel takes the
    /// value found at `transform.apply(voxel)` in the source. Positions
    /// outside the source read as zero.
    pub fn resample(
        source: &Array3<u16>,
        transform: &VoxelTransform,
        order: InterpolationOrder,
    ) -> Array3<u16> {
        let mut output = Array3::<u16>::zeros(source.raw_dim());
        Zip::indexed(&mut output).par_for_each(|(i, j, k), value| {
            let position = transform.apply([i as f64, j as f64, k as f64]);
            let sampled = match order {
                InterpolationOrder::Nearest => Interpolator::nearest(source, position),
                InterpolationOrder::Trilinear => Interpolator::trilinear(source, position),
            };
            *value = sampled.round().clamp(0.0, u16::MAX as f64) as u16;
        });
        output
    }

    /// Convert `transform` to voxel space and resample in one call.
    pub fn apply(
        source: &Array3<u16>,
        spacing: [f64; 3],
        transform: &RigidTransform,
        order: InterpolationOrder,
    ) -> Result<Array3<u16>, ResampleError> {
        let geometry = Geometry::from_dim(source.dim(), spacing);
        let voxel_transform = VoxelTransform::from_physical(transform, &geometry)?;
        Ok(Self::resample(source, &voxel_transform, order))
    }
}
