//! Constrained dual quadric: an ellipsoid parameterized by pose and radii.
//!
//! The dual quadric matrix is
//! ```text
//! Q* = Z · diag(r₁², r₂², r₃², -1) · Zᵀ
//! ```
//! where Z is the 4x4 homogeneous pose of the ellipsoid. Constraining the parameterization
//! this way guarantees Q* always describes a real, non-degenerate ellipsoid.
//!
//! # Manifold
//!
//! The tangent space has 9 coordinates ordered `[θ(3), ρ(3), log r(3)]`:
//! - `θ`, `ρ`: rotation and translation parts of a right perturbation of the pose
//! - `log r`: multiplicative radii update `r ⊙ exp(δ)`, so every tangent vector yields
//!   positive radii
//!
//! The representation vector is `[tx, ty, tz, qw, qx, qy, qz, r1, r2, r3]`.

use crate::core::values::{Values, VariableEnum};
use crate::error::{QuadricError, QuadricResult};
use crate::geometry::{AlignedBox3, Matrix16x9};
use crate::manifold::se3::{SE3, SE3Tangent};
use crate::manifold::so3::SO3;
use crate::manifold::{LieGroup, Manifold, ManifoldResult, check_tangent_dimension};
use crate::utils::se3_generator;
use nalgebra::{DVector, Matrix3, Matrix4, SymmetricEigen, Vector3, Vector4};
use std::fmt;
use tracing::warn;

/// Relative size below which an eigenvalue or the homogeneous entry is treated as zero
/// when constraining an arbitrary matrix.
const CONSTRAIN_EPSILON: f64 = 1e-12;

/// Ellipsoid variable with 9 degrees of freedom (pose + 3 positive radii).
#[derive(Clone, Debug, PartialEq)]
pub struct ConstrainedDualQuadric {
    pose: SE3,
    radii: Vector3<f64>,
}

impl Default for ConstrainedDualQuadric {
    /// Unit sphere at the origin.
    fn default() -> Self {
        Self {
            pose: SE3::identity(),
            radii: Vector3::repeat(1.0),
        }
    }
}

impl ConstrainedDualQuadric {
    /// Create a quadric from its pose and radii.
    ///
    /// # Errors
    /// [`QuadricError::InvalidShape`] if any radius is not strictly positive and finite.
    pub fn new(pose: SE3, radii: Vector3<f64>) -> QuadricResult<Self> {
        if radii.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(QuadricError::InvalidShape(format!(
                "radii must be positive and finite, got [{}, {}, {}]",
                radii.x, radii.y, radii.z
            )));
        }
        Ok(Self { pose, radii })
    }

    /// Create a quadric from rotation, translation and radii.
    pub fn from_rotation_translation_radii(
        rotation: SO3,
        translation: Vector3<f64>,
        radii: Vector3<f64>,
    ) -> QuadricResult<Self> {
        Self::new(SE3::from_translation_so3(translation, rotation), radii)
    }

    /// Project an arbitrary symmetric 4x4 dual quadric onto the nearest ellipsoid.
    ///
    /// The matrix is scaled so that its homogeneous entry is -1, the centroid is read from
    /// the last column, and the centered 3x3 shape block is eigen-decomposed: radii are the
    /// square roots of the absolute eigenvalues, the rotation is the eigenvector basis with
    /// its determinant forced to +1. Applying this to the matrix of an existing quadric
    /// reproduces the same matrix.
    ///
    /// # Errors
    /// [`QuadricError::InvalidShape`] if the matrix is not finite, its homogeneous entry is
    /// zero, or the shape block is singular.
    pub fn constrain(dual_quadric: &Matrix4<f64>) -> QuadricResult<Self> {
        if dual_quadric.iter().any(|v| !v.is_finite()) {
            return Err(QuadricError::InvalidShape(
                "dual quadric contains non-finite entries".to_string(),
            ));
        }
        let symmetric = (dual_quadric + dual_quadric.transpose()) * 0.5;
        let scale = symmetric.amax();
        if scale == 0.0 || symmetric[(3, 3)].abs() <= CONSTRAIN_EPSILON * scale {
            return Err(QuadricError::InvalidShape(
                "dual quadric has no finite centre (Q[3,3] = 0)".to_string(),
            ));
        }

        let normalized = symmetric / -symmetric[(3, 3)];
        let translation: Vector3<f64> = -normalized.fixed_view::<3, 1>(0, 3).into_owned();
        let shape =
            normalized.fixed_view::<3, 3>(0, 0).into_owned() + translation * translation.transpose();

        let eigen = SymmetricEigen::new(shape);
        let max_eigenvalue = eigen.eigenvalues.amax();
        if max_eigenvalue == 0.0
            || eigen
                .eigenvalues
                .iter()
                .any(|l| l.abs() <= CONSTRAIN_EPSILON * max_eigenvalue)
        {
            return Err(QuadricError::InvalidShape(format!(
                "shape block is singular, eigenvalues [{:.3e}, {:.3e}, {:.3e}]",
                eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]
            )));
        }
        if eigen.eigenvalues.iter().any(|l| *l < 0.0) {
            warn!(
                "constraining a non-ellipsoidal quadric, eigenvalues [{:.3e}, {:.3e}, {:.3e}]",
                eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]
            );
        }

        let radii = eigen.eigenvalues.map(|l| l.abs().sqrt());
        let mut rotation: Matrix3<f64> = eigen.eigenvectors;
        if rotation.determinant() < 0.0 {
            rotation.column_mut(2).neg_mut();
        }

        Self::from_rotation_translation_radii(
            SO3::from_rotation_matrix(&rotation),
            translation,
            radii,
        )
    }

    pub fn pose(&self) -> &SE3 {
        &self.pose
    }

    pub fn radii(&self) -> Vector3<f64> {
        self.radii
    }

    /// Centre of the ellipsoid in world coordinates.
    pub fn centroid(&self) -> Vector3<f64> {
        self.pose.translation()
    }

    /// Dual quadric matrix `Q* = Z · diag(r², -1) · Zᵀ`.
    ///
    /// If `jacobian` is provided it receives the derivative of the column-major flattened
    /// matrix with respect to the 9 tangent coordinates `[θ, ρ, log r]`:
    /// ```text
    /// ∂Q*/∂ξ_j   = Z (G_j Qc + Qc G_jᵀ) Zᵀ      (pose generators G_j)
    /// ∂Q*/∂log r_k = 2 r_k² z_k z_kᵀ             (z_k = column k of Z)
    /// ```
    pub fn matrix(&self, jacobian: Option<&mut Matrix16x9>) -> Matrix4<f64> {
        let z = self.pose.matrix();
        let squared = self.radii.component_mul(&self.radii);
        let centered = Matrix4::from_diagonal(&Vector4::new(squared.x, squared.y, squared.z, -1.0));
        let dual_quadric = z * centered * z.transpose();

        if let Some(jac) = jacobian {
            for j in 0..6 {
                // θ occupies tangent slots 0..3 but generator slots 3..6.
                let generator = se3_generator((j + 3) % 6);
                let g_qc = generator * centered;
                let d_q = z * (g_qc + g_qc.transpose()) * z.transpose();
                jac.column_mut(j).copy_from_slice(d_q.as_slice());
            }
            for k in 0..3 {
                let axis: Vector4<f64> = z.column(k).into_owned();
                let d_q = axis * axis.transpose() * (2.0 * squared[k]);
                jac.column_mut(6 + k).copy_from_slice(d_q.as_slice());
            }
        }

        dual_quadric
    }

    /// Dual quadric matrix scaled so that its (3,3) entry is 1.
    pub fn normalized_matrix(&self) -> Matrix4<f64> {
        let matrix = self.matrix(None);
        matrix / matrix[(3, 3)]
    }

    /// Axis-aligned box enclosing the ellipsoid.
    ///
    /// Along world axis i the half extent is `sqrt(Σ_k R_ik² r_k²)`.
    pub fn bounds(&self) -> AlignedBox3 {
        let rotation = self.pose.rotation_matrix();
        let squared = self.radii.component_mul(&self.radii);
        let half_extent = (rotation.component_mul(&rotation) * squared).map(f64::sqrt);
        AlignedBox3::from_center_half_extent(self.centroid(), half_extent)
    }

    /// Whether the centroid has non-positive depth in the frame of `camera_pose`
    /// (camera-to-world, optical axis +z).
    pub fn is_behind(&self, camera_pose: &SE3) -> bool {
        camera_pose.transform_to(&self.centroid()).z <= 0.0
    }

    /// Whether `point` lies inside or on the surface of the ellipsoid.
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        let local = self.pose.transform_to(point);
        local.component_div(&self.radii).norm_squared() - 1.0 <= 0.0
    }

    /// Whether the translation of `pose` lies inside or on the ellipsoid.
    pub fn contains_pose(&self, pose: &SE3) -> bool {
        self.contains(&pose.translation())
    }

    /// `retract` from the unit sphere at the origin.
    pub fn retract_at_origin(delta: &DVector<f64>) -> ManifoldResult<Self> {
        Self::default().retract(delta)
    }

    /// `local_coordinates` of `quadric` relative to the unit sphere at the origin.
    pub fn local_coordinates_at_origin(quadric: &Self) -> DVector<f64> {
        Self::default().local_coordinates(quadric)
    }

    /// Store this quadric in `values` under `key`.
    ///
    /// An existing entry under `key` is overwritten and returned, whatever its type, so
    /// callers that treat a reused key as an error can check for `Some`.
    pub fn add_to_values(&self, values: &mut Values, key: &str) -> Option<VariableEnum> {
        values.insert(key, self.clone())
    }

    /// Read the quadric stored under `key`.
    pub fn get_from_values(values: &Values, key: &str) -> QuadricResult<Self> {
        values.get::<Self>(key).cloned()
    }

    /// Entrywise comparison of the dual quadric matrices within `tolerance`.
    ///
    /// The comparison is absolute and the matrices are not normalized first, so quadrics
    /// whose matrices differ only by a scale factor, or large quadrics with small relative
    /// differences, compare unequal.
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        (self.matrix(None) - other.matrix(None)).amax() <= tolerance
    }
}

impl Manifold for ConstrainedDualQuadric {
    const DOF: usize = 9;

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        check_tangent_dimension(delta, <Self as Manifold>::DOF)?;
        let pose_delta = SE3Tangent::new(
            Vector3::new(delta[3], delta[4], delta[5]),
            Vector3::new(delta[0], delta[1], delta[2]),
        );
        let scale = Vector3::new(delta[6].exp(), delta[7].exp(), delta[8].exp());
        Ok(Self {
            pose: self.pose.plus(&pose_delta),
            radii: self.radii.component_mul(&scale),
        })
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        let pose_delta = other.pose.minus(&self.pose);
        let theta = pose_delta.theta();
        let rho = pose_delta.rho();
        let log_ratio = other.radii.component_div(&self.radii).map(f64::ln);
        DVector::from_vec(vec![
            theta.x,
            theta.y,
            theta.z,
            rho.x,
            rho.y,
            rho.z,
            log_ratio.x,
            log_ratio.y,
            log_ratio.z,
        ])
    }
}

impl From<ConstrainedDualQuadric> for DVector<f64> {
    fn from(quadric: ConstrainedDualQuadric) -> Self {
        let pose: DVector<f64> = quadric.pose.into();
        let mut data = DVector::zeros(10);
        data.rows_mut(0, 7).copy_from(&pose);
        data.rows_mut(7, 3).copy_from(&quadric.radii);
        data
    }
}

impl TryFrom<&DVector<f64>> for ConstrainedDualQuadric {
    type Error = QuadricError;

    fn try_from(data: &DVector<f64>) -> QuadricResult<Self> {
        if data.len() != 10 {
            return Err(QuadricError::InvalidInput(format!(
                "quadric vector must have 10 elements [t, q, r], got {}",
                data.len()
            )));
        }
        let pose = SE3::try_from(&data.rows(0, 7).into_owned())?;
        Self::new(pose, Vector3::new(data[7], data[8], data[9]))
    }
}

impl fmt::Display for ConstrainedDualQuadric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstrainedDualQuadric(pose: {}, radii: [{:.4}, {:.4}, {:.4}])",
            self.pose, self.radii.x, self.radii.y, self.radii.z
        )
    }
}
