use serde::Deserialize;

/// The three canonical viewing planes. Each plane is perpendicular to one
/// volume axis and displays the other two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Transverse,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Transverse,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// The volume axis this plane is perpendicular to.
    pub fn axis(self) -> usize {
        match self {
            Orientation::Transverse => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }

    pub fn from_axis(axis: usize) -> Option<Self> {
        match axis {
            0 => Some(Orientation::Transverse),
            1 => Some(Orientation::Coronal),
            2 => Some(Orientation::Sagittal),
            _ => None,
        }
    }

    /// Volume axes shown as (columns, rows) of a slice in this plane.
    pub fn in_plane_axes(self) -> (usize, usize) {
        match self {
            // Looking down z: sagittal is width, coronal is height
            Orientation::Transverse => (2, 1),
            // Looking down y: sagittal is width, transverse is height
            Orientation::Coronal => (2, 0),
            // Looking down x: coronal is width, transverse is height
            Orientation::Sagittal => (1, 0),
        }
    }

    /// In-plane axes in ascending order, as used by the 90° rotation.
    pub fn rotation_axes(self) -> (usize, usize) {
        let (col, row) = self.in_plane_axes();
        (col.min(row), col.max(row))
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Transverse => "transverse",
            Orientation::Coronal => "coronal",
            Orientation::Sagittal => "sagittal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    Counterclockwise,
}

impl RotationDirection {
    pub fn inverse(self) -> Self {
        match self {
            RotationDirection::Clockwise => RotationDirection::Counterclockwise,
            RotationDirection::Counterclockwise => RotationDirection::Clockwise,
        }
    }
}

/// How a slice along an axis is addressed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SliceSelector {
    Index(usize),
    Mm(f64),
    /// Fraction of the axis in `[0, 1]`.
    Percent(f64),
}

/// Display-time interpolation of a slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Bilinear,
    #[default]
    None,
}

/// Interpolation order used when resampling a whole volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum InterpolationOrder {
    Nearest,
    #[default]
    Trilinear,
}

impl TryFrom<u8> for InterpolationOrder {
    type Error = String;

    fn try_from(order: u8) -> Result<Self, Self::Error> {
        match order {
            0 => Ok(InterpolationOrder::Nearest),
            1 => Ok(InterpolationOrder::Trilinear),
            other => Err(format!("interpolation order must be 0 or 1, got {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
