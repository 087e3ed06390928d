use ndarray::{Array3, ArrayView2};

pub(crate) struct Interpolator;

impl Interpolator {
    /// Per-axis voxel counts after resampling every axis to the finest
    /// spacing, in volume axis order.
    pub(crate) fn get_isotropic_dimensions(
        spacing: [f64; 3],
        original_dim: (usize, usize, usize),
    ) -> [u32; 3] {
        let min_spacing = spacing[0].min(spacing[1]).min(spacing[2]);
        let inv_min_spacing = 1.0 / min_spacing;
        let dims = [original_dim.0, original_dim.1, original_dim.2];

        let mut isotropic = [0_u32; 3];
        for axis in 0..3 {
            isotropic[axis] = (dims[axis] as f64 * spacing[axis] * inv_min_spacing).round() as u32;
        }
        isotropic
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<u16>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]] as f32;
        let v01 = slice[[y0, x1]] as f32;
        let v10 = slice[[y1, x0]] as f32;
        let v11 = slice[[y1, x1]] as f32;

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Value of the voxel nearest to `position`; zero outside the grid.
    #[inline]
    pub(crate) fn nearest(volume: &Array3<u16>, position: [f64; 3]) -> f64 {
        let index = [
            position[0].round(),
            position[1].round(),
            position[2].round(),
        ];
        Self::voxel(volume, [index[0] as i64, index[1] as i64, index[2] as i64])
    }

    /// Trilinear interpolation at `position`; neighbours outside the grid
    /// count as zero.
    #[inline]
    pub(crate) fn trilinear(volume: &Array3<u16>, position: [f64; 3]) -> f64 {
        let base = [
            position[0].floor(),
            position[1].floor(),
            position[2].floor(),
        ];
        let frac = [
            position[0] - base[0],
            position[1] - base[1],
            position[2] - base[2],
        ];
        let origin = [base[0] as i64, base[1] as i64, base[2] as i64];

        let mut value = 0.0;
        for corner in 0..8_usize {
            let offset = [(corner >> 2) & 1, (corner >> 1) & 1, corner & 1];
            let mut weight = 1.0;
            for axis in 0..3 {
                weight *= if offset[axis] == 1 {
                    frac[axis]
                } else {
                    1.0 - frac[axis]
                };
            }
            if weight == 0.0 {
                continue;
            }
            let index = [
                origin[0] + offset[0] as i64,
                origin[1] + offset[1] as i64,
                origin[2] + offset[2] as i64,
            ];
            value += weight * Self::voxel(volume, index);
        }
        value
    }

    #[inline]
    fn voxel(volume: &Array3<u16>, index: [i64; 3]) -> f64 {
        let (depth, height, width) = volume.dim();
        let inside = |i: i64, n: usize| i >= 0 && (i as usize) < n;
        if inside(index[0], depth) && inside(index[1], height) && inside(index[2], width) {
            volume[[index[0] as usize, index[1] as usize, index[2] as usize]] as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn cube() -> Array3<u16> {
        Array3::from_shape_fn((2, 2, 2), |(i, j, k)| (i * 4 + j * 2 + k) as u16 * 10)
    }

    #[rstest]
    #[case([0.0, 0.0, 0.0], 0.0)]
    #[case([1.0, 1.0, 1.0], 70.0)]
    #[case([0.5, 0.5, 0.5], 35.0)]
    #[case([0.0, 0.0, 0.25], 2.5)]
    #[case([-1.0, 0.0, 0.0], 0.0)]
    #[case([1.5, 1.0, 1.0], 35.0)]
    fn trilinear_weights(#[case] position: [f64; 3], #[case] expected: f64) {
        assert_float_eq!(Interpolator::trilinear(&cube(), position), expected, abs <= 1e-9);
    }

    #[rstest]
    #[case([0.4, 0.6, 0.0], 20.0)]
    #[case([1.2, 0.0, 0.9], 50.0)]
    #[case([2.0, 0.0, 0.0], 0.0)]
    #[case([-0.6, 0.0, 0.0], 0.0)]
    fn nearest_rounds_and_zero_fills(#[case] position: [f64; 3], #[case] expected: f64) {
        assert_float_eq!(Interpolator::nearest(&cube(), position), expected, abs <= 1e-9);
    }

    #[test]
    fn isotropic_dimensions_scale_to_finest_spacing() {
        let dims = Interpolator::get_isotropic_dimensions([3.0, 0.5, 1.0], (10, 20, 30));
        assert_eq!(dims, [60, 20, 60]);
    }
}
