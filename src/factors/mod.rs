//! Factors connecting camera poses and quadric landmarks.
//!
//! A factor turns the current values of its variables into a residual vector and,
//! optionally, the Jacobian of that residual with respect to the tangent spaces of the
//! variables. The optimizer that consumes them lives outside this crate.
//!
//! # Module Structure
//!
//! - `bounding_box_factor`: projected-quadric vs. detected-box residual

use nalgebra::{DMatrix, DVector};

pub mod bounding_box_factor;

pub use bounding_box_factor::{
    BoundingBoxFactor, BoundingBoxFactorConfig, DEFAULT_FALLBACK_ERROR, FactorEvaluation,
};

/// Residual and Jacobian contract consumed by an external least-squares optimizer.
///
/// Parameters arrive as representation vectors in the order of [`Factor::keys`]
/// (`SE3`: `[tx, ty, tz, qw, qx, qy, qz]`, quadric: `[tx, ty, tz, qw, qx, qy, qz, r1, r2, r3]`).
/// The Jacobian columns are the tangent coordinates of each variable, concatenated in the
/// same order.
pub trait Factor: Send + Sync {
    /// Keys of the connected variables, in parameter order.
    fn keys(&self) -> Vec<&str>;

    /// Representation length expected for each parameter block, in key order.
    fn parameter_sizes(&self) -> Vec<usize>;

    /// Compute the residual and, if `compute_jacobian` is set, its Jacobian.
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>);

    /// Residual dimension.
    fn get_dimension(&self) -> usize;
}
