//! Physical layout of a voxel grid.
//!
//! Every conversion between slice indices and millimetres goes through
//! [`Geometry`]. Physical coordinates are centred on the volume: along an axis
//! with `n` voxels and extent `e`, index `i` sits at `(i / n - 0.5) * e` mm.

/// Voxel counts and spacing of a volume, one entry per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
}

impl Geometry {
    pub fn new(dims: [usize; 3], spacing: [f64; 3]) -> Self {
        Self { dims, spacing }
    }

    pub fn from_dim(dim: (usize, usize, usize), spacing: [f64; 3]) -> Self {
        Self::new([dim.0, dim.1, dim.2], spacing)
    }

    /// Physical length of each axis in mm.
    pub fn extent_mm(&self) -> [f64; 3] {
        [
            self.spacing[0] * self.dims[0] as f64,
            self.spacing[1] * self.dims[1] as f64,
            self.spacing[2] * self.dims[2] as f64,
        ]
    }

    /// Centred physical coordinate of a continuous voxel position.
    #[inline]
    pub fn mm_at(&self, axis: usize, position: f64) -> f64 {
        let extent = self.spacing[axis] * self.dims[axis] as f64;
        (position / self.dims[axis] as f64 - 0.5) * extent
    }

    /// Continuous voxel position of a centred physical coordinate.
    #[inline]
    pub fn position_at(&self, axis: usize, mm: f64) -> f64 {
        let extent = self.spacing[axis] * self.dims[axis] as f64;
        (mm / extent + 0.5) * self.dims[axis] as f64
    }

    pub fn mm_from_index(&self, axis: usize, index: usize) -> f64 {
        self.mm_at(axis, index as f64)
    }

    /// Nearest slice index for a physical coordinate, clamped into the axis.
    pub fn index_from_mm(&self, axis: usize, mm: f64) -> usize {
        self.clamp_position(axis, self.position_at(axis, mm))
    }

    /// Index for a fraction of the axis: `floor(percent * (n - 1))`, clamped.
    pub fn index_from_percent(&self, axis: usize, percent: f64) -> usize {
        let last = self.last_index(axis);
        let index = (percent * last as f64).floor();
        if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(last)
        }
    }

    pub fn clamp_index(&self, axis: usize, index: usize) -> usize {
        index.min(self.last_index(axis))
    }

    pub fn last_index(&self, axis: usize) -> usize {
        self.dims[axis].saturating_sub(1)
    }

    pub fn point_from_index(&self, index: [usize; 3]) -> [f64; 3] {
        [
            self.mm_from_index(0, index[0]),
            self.mm_from_index(1, index[1]),
            self.mm_from_index(2, index[2]),
        ]
    }

    pub fn index_from_point(&self, point: [f64; 3]) -> [usize; 3] {
        [
            self.index_from_mm(0, point[0]),
            self.index_from_mm(1, point[1]),
            self.index_from_mm(2, point[2]),
        ]
    }

    /// Display extent `[-w/2, w/2, -h/2, h/2]` of a plane spanned by the
    /// given column and row axes.
    pub fn plane_extent(&self, column_axis: usize, row_axis: usize) -> [f64; 4] {
        let extent = self.extent_mm();
        let half_width = extent[column_axis] / 2.0;
        let half_height = extent[row_axis] / 2.0;
        [-half_width, half_width, -half_height, half_height]
    }

    fn clamp_position(&self, axis: usize, position: f64) -> usize {
        let rounded = position.round();
        if rounded.is_nan() || rounded <= 0.0 {
            0
        } else {
            (rounded as usize).min(self.last_index(axis))
        }
    }
}
