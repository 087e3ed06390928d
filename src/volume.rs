use crate::config::ClipRange;
use crate::cursor::SliceCursor;
use crate::enums::{Interpolation, Orientation, SliceSelector};
use crate::geometry::Geometry;
use crate::interpolator::Interpolator;
use crate::volume_loader::{VolumeLoaderError, VolumeSource};

use image::ImageBuffer;
use image::Luma;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;
use std::sync::Arc;

/// A 3D grid of intensities with its voxel spacing.
///
/// Axis 0 is transverse (z), axis 1 coronal (y), axis 2 sagittal (x). The
/// physical extent is always derived from the current shape and spacing.
#[derive(Clone, Debug)]
pub struct Volume {
    voxels: Arc<Array3<u16>>,
    spacing: [f64; 3],
    original_voxels: Arc<Array3<u16>>,
    original_spacing: [f64; 3],
    max_intensity: u16,
    generation: u64,
}

/// Voxels and spacing handed to an export collaborator.
#[derive(Clone, Debug)]
pub struct ExportedVolume {
    pub voxels: Array3<u16>,
    pub spacing: [f64; 3],
}

impl Volume {
    pub fn new(data: Array3<u16>, spacing: [f64; 3]) -> Result<Self, VolumeLoaderError> {
        validate_spacing(spacing)?;
        let (depth, height, width) = data.dim();
        if depth == 0 || height == 0 || width == 0 {
            return Err(VolumeLoaderError::EmptySource);
        }
        let max_intensity = data.par_iter().copied().max().unwrap_or(0);
        let voxels = Arc::new(data);
        Ok(Self {
            original_voxels: Arc::clone(&voxels),
            voxels,
            spacing,
            original_spacing: spacing,
            max_intensity,
            generation: 0,
        })
    }

    /// Build a volume from either a multi-frame stack or a list of 2D slices.
    pub fn load_from(source: VolumeSource, spacing: [f64; 3]) -> Result<Self, VolumeLoaderError> {
        let volume = Self::new(source.into_array()?, spacing)?;
        volume.log_summary();
        Ok(volume)
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.voxels.dim()
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::from_dim(self.dim(), self.spacing)
    }

    pub fn extent_mm(&self) -> [f64; 3] {
        self.geometry().extent_mm()
    }

    pub fn mm_from_index(&self, axis: usize, index: usize) -> f64 {
        self.geometry().mm_from_index(axis, index)
    }

    pub fn index_from_mm(&self, axis: usize, mm: f64) -> usize {
        self.geometry().index_from_mm(axis, mm)
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u16> {
        &self.voxels
    }

    pub(crate) fn shared_data(&self) -> Arc<Array3<u16>> {
        Arc::clone(&self.voxels)
    }

    /// Maximum intensity of the volume as loaded.
    pub fn max_intensity(&self) -> u16 {
        self.max_intensity
    }

    /// Incremented whenever the voxel array is replaced; any slice cached
    /// under an older generation is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Swap in a new voxel array and spacing as one step.
    pub(crate) fn replace(&mut self, voxels: Array3<u16>, spacing: [f64; 3]) {
        self.voxels = Arc::new(voxels);
        self.spacing = spacing;
        self.generation += 1;
    }

    /// The slice at `index` along the plane's axis. Out of range indices are
    /// clamped to the last slice.
    ///
    /// The returned view borrows the volume, so it is a snapshot that cannot
    /// outlive a later change to the voxels.
    pub fn get_slice_from_axis(&self, index: usize, orientation: Orientation) -> ArrayView2<'_, u16> {
        let index = self.geometry().clamp_index(orientation.axis(), index);
        match orientation {
            Orientation::Transverse => self.voxels.slice(s![index, .., ..]),
            Orientation::Coronal => self.voxels.slice(s![.., index, ..]),
            Orientation::Sagittal => self.voxels.slice(s![.., .., index]),
        }
    }

    pub fn get_slice(&self, orientation: Orientation, selector: SliceSelector) -> ArrayView2<'_, u16> {
        self.get_slice_from_axis(self.resolve(orientation, selector), orientation)
    }

    /// Index addressed by `selector` along the plane's axis.
    pub fn resolve(&self, orientation: Orientation, selector: SliceSelector) -> usize {
        let geometry = self.geometry();
        let axis = orientation.axis();
        match selector {
            SliceSelector::Index(index) => geometry.clamp_index(axis, index),
            SliceSelector::Mm(mm) => geometry.index_from_mm(axis, mm),
            SliceSelector::Percent(percent) => geometry.index_from_percent(axis, percent),
        }
    }

    /// Symmetrically zero-pad every axis whose extent falls short of
    /// `target_extent_mm`. The cursor moves with the leading padding so it
    /// stays on the same voxel. Returns whether anything was padded.
    pub fn pad_to_dims(&mut self, target_extent_mm: [f64; 3], cursor: &mut SliceCursor) -> bool {
        let extent = self.extent_mm();
        let mut before = [0_usize; 3];
        let mut after = [0_usize; 3];
        for axis in 0..3 {
            let missing = target_extent_mm[axis] - extent[axis];
            if missing <= 0.0 {
                continue;
            }
            let voxels = (missing / self.spacing[axis]).round() as usize;
            before[axis] = voxels / 2;
            after[axis] = voxels - voxels / 2;
        }
        if before.iter().chain(after.iter()).all(|&n| n == 0) {
            return false;
        }

        let (depth, height, width) = self.dim();
        let mut padded = Array3::<u16>::zeros((
            depth + before[0] + after[0],
            height + before[1] + after[1],
            width + before[2] + after[2],
        ));
        padded
            .slice_mut(s![
                before[0]..before[0] + depth,
                before[1]..before[1] + height,
                before[2]..before[2] + width
            ])
            .assign(&self.voxels);

        let index = cursor.index();
        self.replace(padded, self.spacing);
        let geometry = self.geometry();
        cursor.set_indices(
            &geometry,
            [
                index[0] + before[0],
                index[1] + before[1],
                index[2] + before[2],
            ],
        );
        log::debug!(
            "padded volume to {:?} voxels ({:?} before, {:?} after)",
            geometry.dims,
            before,
            after
        );
        true
    }

    /// Restore the voxels and spacing captured at load time and re-centre the
    /// cursor. Any applied registration is discarded.
    pub fn reset(&mut self, cursor: &mut SliceCursor) {
        self.voxels = Arc::clone(&self.original_voxels);
        self.spacing = self.original_spacing;
        self.generation += 1;
        cursor.recentre(&self.geometry());
    }

    pub fn export(&self) -> ExportedVolume {
        ExportedVolume {
            voxels: self.voxels.as_ref().clone(),
            spacing: self.spacing,
        }
    }

    pub fn log_summary(&self) {
        let geometry = self.geometry();
        let extent = geometry.extent_mm();
        log::info!(
            "image size: {} x {} x {} vxls, image dims: [{:.2}, {:.2}, {:.2}] mm, voxel dims: [{}, {}, {}] mm",
            geometry.dims[0],
            geometry.dims[1],
            geometry.dims[2],
            extent[0],
            extent[1],
            extent[2],
            geometry.spacing[0],
            geometry.spacing[1],
            geometry.spacing[2]
        );
    }

    fn get_output_dimensions(&self, orientation: Orientation) -> (u32, u32) {
        let isotropic = Interpolator::get_isotropic_dimensions(self.spacing, self.dim());
        let (column_axis, row_axis) = orientation.in_plane_axes();
        (isotropic[column_axis], isotropic[row_axis])
    }

    /// Render a slice as an 8-bit image, windowed to `clip` (fractions of the
    /// load-time maximum). With [`Interpolation::Bilinear`] the image is
    /// resized so that one pixel covers the same distance on both axes.
    pub fn render_slice(
        &self,
        index: usize,
        orientation: Orientation,
        clip: ClipRange,
        interpolation: Interpolation,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, orientation);
        let (low, high) = clip.window(self.max_intensity);

        match interpolation {
            Interpolation::None => Self::slice_to_image(&slice, low, high),
            Interpolation::Bilinear => {
                let (width, height) = self.get_output_dimensions(orientation);
                Self::interpolate_slice(&slice, width, height, low, high)
            }
        }
    }

    #[inline]
    fn normalize_to_u8(value: f32, low: f32, high: f32) -> u8 {
        if high <= low {
            return if value >= high { 255 } else { 0 };
        }
        (((value - low) / (high - low)) * 255.0).clamp(0.0, 255.0) as u8
    }

    fn slice_to_image(
        slice: &ArrayView2<'_, u16>,
        low: f32,
        high: f32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| Self::normalize_to_u8(v as f32, low, high))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn interpolate_slice(
        slice: &ArrayView2<'_, u16>,
        width: u32,
        height: u32,
        low: f32,
        high: f32,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (slice_height, slice_width) = slice.dim();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        // Pixel centres in normalized coordinates
                        let norm_x = (x as f32 + 0.5) / width as f32;
                        let norm_y = (y as f32 + 0.5) / height as f32;

                        let src_x = norm_x * slice_width as f32 - 0.5;
                        let src_y = norm_y * slice_height as f32 - 0.5;

                        let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

                        let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                        Self::normalize_to_u8(value, low, high)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        ImageBuffer::from_raw(width, height, pixel_data)
    }
}

fn validate_spacing(spacing: [f64; 3]) -> Result<(), VolumeLoaderError> {
    if spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
        Ok(())
    } else {
        Err(VolumeLoaderError::InvalidSpacing(spacing))
    }
}
