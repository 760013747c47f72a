//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! This module provides the manifolds the quadric factors live on:
//! - **SO(3)**: rotations, the orientation part of camera and quadric poses
//! - **SE(3)**: rigid body transformations (camera poses, quadric poses)
//! - **ConstrainedDualQuadric**: SE(3) × R³₊, implemented in
//!   [`crate::geometry::constrained_dual_quadric`] on top of [`Manifold`]
//!
//! Lie group M,° | size   | dim | X ∈ M                   | Constraint      | T_X M                 | Exp(T)             | Comp. | Action
//! ------------- | ------ | --- | ----------------------- | --------------- | --------------------- | ------------------ | ----- | ------
//! Rotation      | SO(3),.| 9   | 3   | R                 | RᵀR = I         | [θ] ∈ R³              | R = exp([θ]x)      | R₁R₂  | Rx
//! Rigid motion  | SE(3),.| 16  | 6   | M = [R t; 0 1]    | RᵀR = I         | [ρ, θ] ∈ R⁶           | Exp([ρ, θ]^)       | M₁M₂  | Rx+t
//!
//! The conventions follow the [manif](https://github.com/artivis/manif) C++ library with
//! right perturbations, `X ⊞ τ = X ∘ exp(τ)`. The analytic Jacobians the factors need
//! are derived in [`crate::geometry`] from the se(3) generators.

use nalgebra::{DVector, Vector3};
use std::fmt::Debug;
use thiserror::Error;

pub mod se3;
pub mod so3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },
    /// Invalid representation vector dimension
    #[error("Invalid representation dimension: expected {expected}, got {actual}")]
    InvalidRepresentationDimension { expected: usize, actual: usize },
    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Perturbations act on the right, `X ⊞ τ = X ∘ exp(τ)`.
///
/// # Dimensions
///
/// - `DOF`: Degrees of freedom, i.e. tangent space dimension
/// - `REP_SIZE`: Size of the stored representation (quaternion + translation)
pub trait LieGroup: Clone + Debug + PartialEq {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    const DOF: usize;
    const REP_SIZE: usize;

    /// Identity element.
    fn identity() -> Self;

    /// Inverse element g⁻¹.
    fn inverse(&self) -> Self;

    /// Composition g₁ ∘ g₂.
    fn compose(&self, other: &Self) -> Self;

    /// Logarithmic map log(g)^∨.
    fn log(&self) -> Self::TangentVector;

    /// Group action on a 3D vector.
    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64>;

    /// Right plus: g ⊞ φ = g ∘ exp(φ^∧).
    fn right_plus(&self, tangent: &Self::TangentVector) -> Self {
        self.compose(&tangent.exp())
    }

    /// Right minus: g₁ ⊟ g₂ = log(g₂⁻¹ ∘ g₁)^∨.
    fn right_minus(&self, other: &Self) -> Self::TangentVector {
        other.inverse().compose(self).log()
    }

    /// Convenience method for right_plus.
    fn plus(&self, tangent: &Self::TangentVector) -> Self {
        self.right_plus(tangent)
    }

    /// Convenience method for right_minus.
    fn minus(&self, other: &Self) -> Self::TangentVector {
        self.right_minus(other)
    }
}

/// Trait for Lie algebra (tangent space) elements.
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// Exponential map exp(φ^∧).
    fn exp(&self) -> G;

    fn zero() -> Self;

    fn is_zero(&self, tolerance: f64) -> bool;
}

/// Minimal manifold contract consumed by an external optimizer.
///
/// An optimizer only needs the tangent dimension and the pair of maps between the
/// manifold and its tangent space; it never sees the internals of the variable.
///
/// Both maps must satisfy, for small `v`:
/// - `x.local_coordinates(&x.retract(v)) == v`
/// - `x.retract(&x.local_coordinates(y)) == y`
pub trait Manifold: Clone + Debug + Send + Sync {
    /// Tangent space dimension
    const DOF: usize;

    /// Move from `self` by the tangent vector `delta` and map back onto the manifold.
    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self>;

    /// Tangent vector `v` such that `self.retract(v) == other`.
    fn local_coordinates(&self, other: &Self) -> DVector<f64>;
}

/// Check a tangent update against the manifold dimension.
pub(crate) fn check_tangent_dimension(delta: &DVector<f64>, expected: usize) -> ManifoldResult<()> {
    if delta.len() != expected {
        return Err(ManifoldError::InvalidTangentDimension {
            expected,
            actual: delta.len(),
        });
    }
    Ok(())
}
