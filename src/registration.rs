//! Landmark-based rigid registration.
//!
//! Given two ordered lists of corresponding physical points the rotation is
//! estimated from the SVD of the cross-covariance of the centred sets
//! (Kabsch), with a reflection correction so the result is always a proper
//! rotation.

use crate::geometry::Geometry;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use thiserror::Error;

pub const MIN_POINTS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum RegistrationError {
    #[error("At least 3 landmark pairs are required, got {source_points} and {target_points}")]
    InsufficientPoints {
        source_points: usize,
        target_points: usize,
    },

    #[error("Landmark counts differ: {source_points} source and {target_points} target points")]
    MismatchedCounts {
        source_points: usize,
        target_points: usize,
    },

    #[error("Singular value decomposition did not converge")]
    Decomposition,
}

/// A rotation followed by a translation, as a 4x4 homogeneous matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix4<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_parts(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    pub fn translation_only(translation: [f64; 3]) -> Self {
        Self::from_parts(Matrix3::identity(), Vector3::from(translation))
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    /// The inverse mapping, or `None` when the matrix is singular.
    pub fn try_inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Least-squares rigid transform mapping `source` onto `target`,
/// minimising `Σ‖R·sᵢ + t − tᵢ‖²`.
pub fn compute_rigid_transform(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> Result<RigidTransform, RegistrationError> {
    if source.len() < MIN_POINTS || target.len() < MIN_POINTS {
        return Err(RegistrationError::InsufficientPoints {
            source_points: source.len(),
            target_points: target.len(),
        });
    }
    if source.len() != target.len() {
        return Err(RegistrationError::MismatchedCounts {
            source_points: source.len(),
            target_points: target.len(),
        });
    }

    let source_centroid = centroid(source);
    let target_centroid = centroid(target);

    let mut h = Matrix3::<f64>::zeros();
    for (s, t) in source.iter().zip(target) {
        h += (s - source_centroid) * (t - target_centroid).transpose();
    }

    // Singular values come back in descending order, so the last row of Vᵗ
    // belongs to the smallest one.
    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::Decomposition)?;
    let mut v_t = svd.v_t.ok_or(RegistrationError::Decomposition)?;

    let mut rotation = v_t.transpose() * u.transpose();
    if rotation.determinant() < 0.0 {
        v_t.row_mut(2).neg_mut();
        rotation = v_t.transpose() * u.transpose();
    }

    let translation = target_centroid.coords - rotation * source_centroid.coords;
    Ok(RigidTransform::from_parts(rotation, translation))
}

/// Root mean square distance between the mapped source points and their
/// targets.
pub fn residual_rms(
    transform: &RigidTransform,
    source: &[Point3<f64>],
    target: &[Point3<f64>],
) -> f64 {
    if source.is_empty() {
        return 0.0;
    }
    let sum: f64 = source
        .iter()
        .zip(target)
        .map(|(s, t)| (transform.transform_point(s) - t).norm_squared())
        .sum();
    (sum / source.len() as f64).sqrt()
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

/// Physical position of a voxel index triplet.
pub fn landmark_from_index(geometry: &Geometry, index: [usize; 3]) -> Point3<f64> {
    Point3::from(geometry.point_from_index(index))
}

/// Both landmark lists of one registration and the transform derived from
/// them. Clearing or editing points drops the transform; no volume is touched
/// until the transform is applied.
#[derive(Clone, Debug, Default)]
pub struct RegistrationSession {
    source_points: Vec<Point3<f64>>,
    target_points: Vec<Point3<f64>>,
    transform: Option<RigidTransform>,
}

/// Which side of the registration a landmark belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandmarkSet {
    Source,
    Target,
}

impl RegistrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self, set: LandmarkSet) -> &[Point3<f64>] {
        match set {
            LandmarkSet::Source => &self.source_points,
            LandmarkSet::Target => &self.target_points,
        }
    }

    pub fn add_point(&mut self, set: LandmarkSet, point: Point3<f64>) {
        self.points_mut(set).push(point);
        self.transform = None;
    }

    pub fn remove_point(&mut self, set: LandmarkSet, position: usize) -> Option<Point3<f64>> {
        let points = self.points_mut(set);
        if position >= points.len() {
            return None;
        }
        let removed = points.remove(position);
        self.transform = None;
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.source_points.clear();
        self.target_points.clear();
        self.transform = None;
    }

    pub fn transform(&self) -> Option<&RigidTransform> {
        self.transform.as_ref()
    }

    pub fn compute(&mut self) -> Result<RigidTransform, RegistrationError> {
        let transform = compute_rigid_transform(&self.source_points, &self.target_points)?;
        let rms = residual_rms(&transform, &self.source_points, &self.target_points);
        log::info!(
            "computed rigid transform from {} landmark pairs, rms residual {:.4} mm",
            self.source_points.len(),
            rms
        );
        self.transform = Some(transform);
        Ok(transform)
    }

    fn points_mut(&mut self, set: LandmarkSet) -> &mut Vec<Point3<f64>> {
        match set {
            LandmarkSet::Source => &mut self.source_points,
            LandmarkSet::Target => &mut self.target_points,
        }
    }
}
