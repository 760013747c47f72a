//! Bounding box factor between a camera pose and a quadric landmark.
//!
//! # Residual
//!
//! The quadric is projected into the camera and the bounding box of the resulting dual
//! conic is compared with the detected box:
//! ```text
//! e = box(project(Q, T, K)) - measured      (xmin, ymin, xmax, ymax)
//! ```
//!
//! # Fallback
//!
//! When the quadric is behind the camera or its projection is not a proper ellipse the
//! residual is undefined. The factor then reports a constant residual of
//! [`BoundingBoxFactorConfig::fallback_error`] per component with zero Jacobians, so the
//! optimizer keeps running and sees no gradient through the invalid configuration.
//!
//! # Jacobian Layout
//!
//! `[∂e/∂pose (4x6) | ∂e/∂quadric (4x9)]`, pose tangent `[ρ, θ]`, quadric tangent
//! `[θ, ρ, log r]`.

use super::Factor;
use crate::core::values::Values;
use crate::error::QuadricResult;
use crate::geometry::{
    AlignedBox2, Calibration, ConstrainedDualQuadric, Matrix4x9, QuadricCamera,
};
use crate::manifold::se3::SE3;
use crate::utils::hstack;
use nalgebra::{DMatrix, DVector, Matrix4x6, Vector4};
use tracing::{debug, warn};

/// Residual reported per component for invalid projections.
pub const DEFAULT_FALLBACK_ERROR: f64 = 1e6;

const POSE_TANGENT_DIM: usize = 6;
const QUADRIC_TANGENT_DIM: usize = 9;
const POSE_PARAMETER_DIM: usize = 7;
const QUADRIC_PARAMETER_DIM: usize = 10;

/// Tunable behaviour of [`BoundingBoxFactor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxFactorConfig {
    /// Residual value substituted for every component when projection fails
    pub fallback_error: f64,
}

impl Default for BoundingBoxFactorConfig {
    fn default() -> Self {
        Self {
            fallback_error: DEFAULT_FALLBACK_ERROR,
        }
    }
}

impl BoundingBoxFactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback residual.
    pub fn with_fallback_error(mut self, fallback_error: f64) -> Self {
        self.fallback_error = fallback_error;
        self
    }
}

/// Error and key-tagged Jacobian blocks from [`BoundingBoxFactor::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct FactorEvaluation {
    pub error: Vector4<f64>,
    /// `(key, ∂error/∂variable)`, pose block first
    pub jacobians: Vec<(String, DMatrix<f64>)>,
}

impl FactorEvaluation {
    /// Jacobian block of the variable stored under `key`.
    pub fn jacobian(&self, key: &str) -> Option<&DMatrix<f64>> {
        self.jacobians
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, jacobian)| jacobian)
    }
}

/// Factor comparing a detected image box with the projection of a quadric.
///
/// # Example
///
/// ```
/// use apex_quadric::factors::BoundingBoxFactor;
/// use apex_quadric::geometry::{AlignedBox2, Calibration, ConstrainedDualQuadric};
/// use apex_quadric::manifold::se3::SE3;
///
/// # fn main() -> Result<(), apex_quadric::QuadricError> {
/// let measured = AlignedBox2::new(218.0, 138.0, 422.0, 342.0)?;
/// let factor = BoundingBoxFactor::new(measured, Calibration::new(500.0, 500.0, 320.0, 240.0), "x0", "q0");
///
/// let camera = SE3::from_translation_euler(0.0, 0.0, -5.0, 0.0, 0.0, 0.0);
/// let error = factor.evaluate_error(&camera, &ConstrainedDualQuadric::default(), None, None);
/// assert!(error.norm() < 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxFactor {
    measured: AlignedBox2,
    calibration: Calibration,
    pose_key: String,
    quadric_key: String,
    config: BoundingBoxFactorConfig,
}

impl BoundingBoxFactor {
    /// Create a factor with the default fallback residual.
    pub fn new(
        measured: AlignedBox2,
        calibration: Calibration,
        pose_key: impl Into<String>,
        quadric_key: impl Into<String>,
    ) -> Self {
        Self::with_config(
            measured,
            calibration,
            pose_key,
            quadric_key,
            BoundingBoxFactorConfig::default(),
        )
    }

    pub fn with_config(
        measured: AlignedBox2,
        calibration: Calibration,
        pose_key: impl Into<String>,
        quadric_key: impl Into<String>,
        config: BoundingBoxFactorConfig,
    ) -> Self {
        Self {
            measured,
            calibration,
            pose_key: pose_key.into(),
            quadric_key: quadric_key.into(),
            config,
        }
    }

    pub fn measured(&self) -> &AlignedBox2 {
        &self.measured
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> &BoundingBoxFactorConfig {
        &self.config
    }

    pub fn pose_key(&self) -> &str {
        &self.pose_key
    }

    pub fn quadric_key(&self) -> &str {
        &self.quadric_key
    }

    /// Residual `predicted - measured` for the given variable values.
    ///
    /// `h_pose` and `h_quadric` receive the 4x6 and 4x9 Jacobian blocks. On projection
    /// failure the fallback residual is returned and both blocks are zero.
    pub fn evaluate_error(
        &self,
        pose: &SE3,
        quadric: &ConstrainedDualQuadric,
        h_pose: Option<&mut Matrix4x6<f64>>,
        h_quadric: Option<&mut Matrix4x9>,
    ) -> Vector4<f64> {
        let wants_jacobian = h_pose.is_some() || h_quadric.is_some();
        let mut jacobian_pose = Matrix4x6::zeros();
        let mut jacobian_quadric = Matrix4x9::zeros();

        let projected = if wants_jacobian {
            QuadricCamera::project_bounds(
                quadric,
                pose,
                &self.calibration,
                Some(&mut jacobian_quadric),
                Some(&mut jacobian_pose),
            )
        } else {
            QuadricCamera::project_bounds(quadric, pose, &self.calibration, None, None)
        };

        let error = match projected {
            Ok(predicted) => predicted.vector() - self.measured.vector(),
            Err(e) => {
                if e.is_recoverable() {
                    debug!(
                        "{} -> {}: {}, using fallback residual",
                        self.pose_key, self.quadric_key, e
                    );
                } else {
                    warn!(
                        "{} -> {}: unexpected projection failure: {}",
                        self.pose_key, self.quadric_key, e
                    );
                }
                jacobian_pose.fill(0.0);
                jacobian_quadric.fill(0.0);
                Vector4::repeat(self.config.fallback_error)
            }
        };

        if let Some(h) = h_pose {
            *h = jacobian_pose;
        }
        if let Some(h) = h_quadric {
            *h = jacobian_quadric;
        }
        error
    }

    /// Fetch both variables from `values` and evaluate the error with key-tagged Jacobians.
    ///
    /// # Errors
    /// Missing keys or variables of the wrong type. Projection failures are not errors;
    /// they produce the fallback residual.
    pub fn evaluate(&self, values: &Values) -> QuadricResult<FactorEvaluation> {
        let pose = values.get::<SE3>(&self.pose_key)?;
        let quadric = values.get::<ConstrainedDualQuadric>(&self.quadric_key)?;

        let mut h_pose = Matrix4x6::zeros();
        let mut h_quadric = Matrix4x9::zeros();
        let error = self.evaluate_error(pose, quadric, Some(&mut h_pose), Some(&mut h_quadric));

        Ok(FactorEvaluation {
            error,
            jacobians: vec![
                (
                    self.pose_key.clone(),
                    DMatrix::from_column_slice(4, POSE_TANGENT_DIM, h_pose.as_slice()),
                ),
                (
                    self.quadric_key.clone(),
                    DMatrix::from_column_slice(4, QUADRIC_TANGENT_DIM, h_quadric.as_slice()),
                ),
            ],
        })
    }

    fn fallback(&self, compute_jacobian: bool) -> (DVector<f64>, Option<DMatrix<f64>>) {
        (
            DVector::from_element(4, self.config.fallback_error),
            compute_jacobian
                .then(|| DMatrix::zeros(4, POSE_TANGENT_DIM + QUADRIC_TANGENT_DIM)),
        )
    }
}

impl Factor for BoundingBoxFactor {
    /// Pose key, then quadric key.
    fn keys(&self) -> Vec<&str> {
        vec![self.pose_key.as_str(), self.quadric_key.as_str()]
    }

    fn parameter_sizes(&self) -> Vec<usize> {
        vec![POSE_PARAMETER_DIM, QUADRIC_PARAMETER_DIM]
    }

    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        assert_eq!(params.len(), 2, "Expected 2 parameter blocks (pose, quadric)");
        assert_eq!(
            params[0].len(),
            POSE_PARAMETER_DIM,
            "Pose must be [tx, ty, tz, qw, qx, qy, qz]"
        );
        assert_eq!(
            params[1].len(),
            QUADRIC_PARAMETER_DIM,
            "Quadric must be [t(3), q(4), r(3)]"
        );

        let pose = match SE3::try_from(&params[0]) {
            Ok(pose) => pose,
            Err(e) => {
                warn!("{}: invalid pose parameters: {}", self.pose_key, e);
                return self.fallback(compute_jacobian);
            }
        };
        let quadric = match ConstrainedDualQuadric::try_from(&params[1]) {
            Ok(quadric) => quadric,
            Err(e) => {
                warn!("{}: invalid quadric parameters: {}", self.quadric_key, e);
                return self.fallback(compute_jacobian);
            }
        };

        if !compute_jacobian {
            let error = self.evaluate_error(&pose, &quadric, None, None);
            return (DVector::from_column_slice(error.as_slice()), None);
        }

        let mut h_pose = Matrix4x6::zeros();
        let mut h_quadric = Matrix4x9::zeros();
        let error = self.evaluate_error(&pose, &quadric, Some(&mut h_pose), Some(&mut h_quadric));
        let jacobian = hstack(&[
            DMatrix::from_column_slice(4, POSE_TANGENT_DIM, h_pose.as_slice()),
            DMatrix::from_column_slice(4, QUADRIC_TANGENT_DIM, h_quadric.as_slice()),
        ])
        .unwrap_or_else(|_| DMatrix::zeros(4, POSE_TANGENT_DIM + QUADRIC_TANGENT_DIM));

        (DVector::from_column_slice(error.as_slice()), Some(jacobian))
    }

    fn get_dimension(&self) -> usize {
        4
    }
}
