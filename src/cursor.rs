use crate::enums::SliceSelector;
use crate::geometry::Geometry;

/// Current slice of a volume along each axis, as an index and the matching
/// physical coordinate.
///
/// The millimetre values are always derived from the indices through
/// [`Geometry`], so the two never disagree.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceCursor {
    index: [usize; 3],
    mm: [f64; 3],
}

impl SliceCursor {
    /// A cursor at the physical centre of the volume.
    pub fn centred(geometry: &Geometry) -> Self {
        let mut cursor = Self {
            index: [0; 3],
            mm: [0.0; 3],
        };
        cursor.recentre(geometry);
        cursor
    }

    pub fn index(&self) -> [usize; 3] {
        self.index
    }

    pub fn mm(&self) -> [f64; 3] {
        self.mm
    }

    pub fn index_on(&self, axis: usize) -> usize {
        self.index[axis]
    }

    pub fn mm_on(&self, axis: usize) -> f64 {
        self.mm[axis]
    }

    /// Move one axis to the slice addressed by `selector`; returns the
    /// resulting (clamped) index.
    pub fn select(&mut self, geometry: &Geometry, axis: usize, selector: SliceSelector) -> usize {
        let index = match selector {
            SliceSelector::Index(index) => geometry.clamp_index(axis, index),
            SliceSelector::Mm(mm) => geometry.index_from_mm(axis, mm),
            SliceSelector::Percent(percent) => geometry.index_from_percent(axis, percent),
        };
        self.set_index(geometry, axis, index);
        index
    }

    pub fn set_index(&mut self, geometry: &Geometry, axis: usize, index: usize) {
        let index = geometry.clamp_index(axis, index);
        self.index[axis] = index;
        self.mm[axis] = geometry.mm_from_index(axis, index);
    }

    pub fn set_indices(&mut self, geometry: &Geometry, index: [usize; 3]) {
        for (axis, &index) in index.iter().enumerate() {
            self.set_index(geometry, axis, index);
        }
    }

    /// Re-derive every index and coordinate after the geometry changed shape.
    pub fn refresh(&mut self, geometry: &Geometry) {
        let index = self.index;
        self.set_indices(geometry, index);
    }

    pub fn recentre(&mut self, geometry: &Geometry) {
        for axis in 0..3 {
            self.select(geometry, axis, SliceSelector::Mm(0.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn geometry() -> Geometry {
        Geometry::new([4, 8, 5], [1.0, 0.5, 2.0])
    }

    #[test]
    fn centred_cursor_sits_at_half_dims() {
        let cursor = SliceCursor::centred(&geometry());
        assert_eq!(cursor.index(), [2, 4, 3]);
        assert_float_eq!(cursor.mm_on(0), 0.0, abs <= 1e-12);
        assert_float_eq!(cursor.mm_on(1), 0.0, abs <= 1e-12);
        assert_float_eq!(cursor.mm_on(2), 1.0, abs <= 1e-12);
    }

    #[rstest]
    #[case(SliceSelector::Index(99), 7)]
    #[case(SliceSelector::Index(3), 3)]
    #[case(SliceSelector::Mm(-100.0), 0)]
    #[case(SliceSelector::Mm(0.5), 5)]
    #[case(SliceSelector::Percent(1.0), 7)]
    #[case(SliceSelector::Percent(0.5), 3)]
    fn selectors_clamp_into_axis(#[case] selector: SliceSelector, #[case] expected: usize) {
        let geometry = geometry();
        let mut cursor = SliceCursor::centred(&geometry);
        assert_eq!(cursor.select(&geometry, 1, selector), expected);
        assert_eq!(cursor.index_on(1), expected);
        assert_float_eq!(
            cursor.mm_on(1),
            geometry.mm_from_index(1, expected),
            abs <= 1e-12
        );
    }

    #[test]
    fn refresh_clamps_after_shrink() {
        let mut cursor = SliceCursor::centred(&geometry());
        cursor.set_index(&geometry(), 1, 7);
        let smaller = Geometry::new([4, 3, 5], [1.0, 0.5, 2.0]);
        cursor.refresh(&smaller);
        assert_eq!(cursor.index_on(1), 2);
    }
}
