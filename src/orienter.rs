//! Discrete reorientation of a volume: quarter turns within a viewing plane
//! and mirroring along one axis.
//!
//! Both operations move the cursor with the voxels, so the voxel under the
//! crosshair before the operation is still under it afterwards. Neither has
//! an automatic undo; apply the inverse operation or [`Volume::reset`].

use crate::cursor::SliceCursor;
use crate::enums::{Orientation, RotationDirection};
use crate::volume::Volume;

use ndarray::Axis;

pub struct VolumeOrienter;

impl VolumeOrienter {
    /// Rotate the voxels a quarter turn within `plane`.
    ///
    /// With in-plane axes `(a, b)`, `a < b`, a clockwise turn carries axis `a`
    /// onto axis `b`: the voxel at `(a: i, b: j)` moves to
    /// `(a: n_b - 1 - j, b: i)`. Counterclockwise is the inverse. Dimensions and
    /// spacing of the two axes are swapped.
    pub fn rotate90(
        volume: &mut Volume,
        cursor: &mut SliceCursor,
        plane: Orientation,
        direction: RotationDirection,
    ) {
        let (a, b) = plane.rotation_axes();
        let geometry = volume.geometry();
        let (n_a, n_b) = (geometry.dims[a], geometry.dims[b]);

        let mut view = volume.data().view();
        match direction {
            RotationDirection::Clockwise => {
                view.invert_axis(Axis(b));
                view.swap_axes(a, b);
            }
            RotationDirection::Counterclockwise => {
                view.swap_axes(a, b);
                view.invert_axis(Axis(b));
            }
        }
        let rotated = view.as_standard_layout().into_owned();

        let mut spacing = volume.spacing();
        spacing.swap(a, b);

        let mut index = cursor.index();
        let (i, j) = (index[a], index[b]);
        match direction {
            RotationDirection::Clockwise => {
                index[a] = n_b - 1 - j;
                index[b] = i;
            }
            RotationDirection::Counterclockwise => {
                index[a] = j;
                index[b] = n_a - 1 - i;
            }
        }

        volume.replace(rotated, spacing);
        cursor.set_indices(&volume.geometry(), index);
        log::debug!(
            "rotated {} plane {:?}, dims now {:?}",
            plane.name(),
            direction,
            volume.geometry().dims
        );
    }

    /// Reverse the voxel order along `axis` and mirror the cursor with it.
    pub fn flip(volume: &mut Volume, cursor: &mut SliceCursor, axis: Orientation) {
        let axis = axis.axis();
        let geometry = volume.geometry();

        let mut view = volume.data().view();
        view.invert_axis(Axis(axis));
        let flipped = view.as_standard_layout().into_owned();

        let mut index = cursor.index();
        index[axis] = geometry.last_index(axis) - index[axis];

        volume.replace(flipped, geometry.spacing);
        cursor.set_indices(&geometry, index);
        log::debug!("flipped volume along axis {axis}");
    }

    /// Flip one of the two screen directions of a panel: `horizontal` mirrors
    /// the panel's column axis, otherwise its row axis.
    pub fn flip_in_plane(
        volume: &mut Volume,
        cursor: &mut SliceCursor,
        plane: Orientation,
        horizontal: bool,
    ) {
        let (column_axis, row_axis) = plane.in_plane_axes();
        let axis = if horizontal { column_axis } else { row_axis };
        if let Some(target) = Orientation::from_axis(axis) {
            Self::flip(volume, cursor, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rstest::rstest;

    fn ramp() -> Volume {
        let data = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| (i * 100 + j * 10 + k) as u16);
        Volume::new(data, [1.0, 2.0, 3.0]).unwrap()
    }

    fn value_under_cursor(volume: &Volume, cursor: &SliceCursor) -> u16 {
        let [i, j, k] = cursor.index();
        volume.data()[[i, j, k]]
    }

    #[rstest]
    #[case(Orientation::Transverse)]
    #[case(Orientation::Coronal)]
    #[case(Orientation::Sagittal)]
    fn flip_twice_restores(#[case] axis: Orientation) {
        let mut volume = ramp();
        let original = volume.data().clone();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        cursor.set_indices(&volume.geometry(), [0, 1, 3]);
        let index = cursor.index();

        VolumeOrienter::flip(&mut volume, &mut cursor, axis);
        assert_ne!(volume.data(), &original);
        VolumeOrienter::flip(&mut volume, &mut cursor, axis);

        assert_eq!(volume.data(), &original);
        assert_eq!(cursor.index(), index);
    }

    #[rstest]
    #[case(Orientation::Transverse, RotationDirection::Clockwise)]
    #[case(Orientation::Transverse, RotationDirection::Counterclockwise)]
    #[case(Orientation::Coronal, RotationDirection::Clockwise)]
    #[case(Orientation::Coronal, RotationDirection::Counterclockwise)]
    #[case(Orientation::Sagittal, RotationDirection::Clockwise)]
    #[case(Orientation::Sagittal, RotationDirection::Counterclockwise)]
    fn four_quarter_turns_restore(#[case] plane: Orientation, #[case] direction: RotationDirection) {
        let mut volume = ramp();
        let original = volume.data().clone();
        let spacing = volume.spacing();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        cursor.set_indices(&volume.geometry(), [2, 0, 4]);
        let index = cursor.index();

        for _ in 0..4 {
            VolumeOrienter::rotate90(&mut volume, &mut cursor, plane, direction);
        }

        assert_eq!(volume.data(), &original);
        assert_eq!(volume.spacing(), spacing);
        assert_eq!(cursor.index(), index);
    }

    #[rstest]
    #[case(Orientation::Transverse, RotationDirection::Clockwise)]
    #[case(Orientation::Coronal, RotationDirection::Counterclockwise)]
    #[case(Orientation::Sagittal, RotationDirection::Clockwise)]
    fn rotation_keeps_voxel_under_cursor(
        #[case] plane: Orientation,
        #[case] direction: RotationDirection,
    ) {
        let mut volume = ramp();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        cursor.set_indices(&volume.geometry(), [1, 3, 0]);
        let before = value_under_cursor(&volume, &cursor);

        VolumeOrienter::rotate90(&mut volume, &mut cursor, plane, direction);

        assert_eq!(value_under_cursor(&volume, &cursor), before);
    }

    #[test]
    fn rotation_swaps_dims_spacing_and_extent() {
        let mut volume = ramp();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        VolumeOrienter::rotate90(
            &mut volume,
            &mut cursor,
            Orientation::Transverse,
            RotationDirection::Clockwise,
        );
        assert_eq!(volume.dim(), (3, 5, 4));
        assert_eq!(volume.spacing(), [1.0, 3.0, 2.0]);
        assert_eq!(volume.extent_mm(), [3.0, 15.0, 8.0]);
    }

    #[test]
    fn clockwise_matches_quarter_turn_layout() {
        let mut volume = ramp();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        VolumeOrienter::rotate90(
            &mut volume,
            &mut cursor,
            Orientation::Transverse,
            RotationDirection::Clockwise,
        );
        // new (a: p, b: q) holds old (a: q, b: n_b - 1 - p)
        assert_eq!(volume.data()[[0, 0, 0]], 4);
        assert_eq!(volume.data()[[0, 4, 3]], 30);
        assert_eq!(volume.data()[[2, 1, 2]], 223);
    }

    #[test]
    fn flip_in_plane_picks_screen_axis() {
        let mut volume = ramp();
        let mut cursor = SliceCursor::centred(&volume.geometry());
        VolumeOrienter::flip_in_plane(&mut volume, &mut cursor, Orientation::Coronal, false);
        assert_eq!(volume.data()[[0, 0, 0]], 200);
    }
}
