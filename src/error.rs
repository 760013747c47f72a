//! Error types for the apex-quadric library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.
//!
//! Geometry errors fall into two groups:
//! - construction-time violations ([`QuadricError::InvalidShape`]) are returned to the caller
//! - transient projection failures ([`QuadricError::BehindCamera`],
//!   [`QuadricError::DegenerateConic`]) are absorbed by factors, which substitute a fixed
//!   fallback residual so the optimizer keeps iterating

use crate::manifold::ManifoldError;
use thiserror::Error;

/// Main result type used throughout the apex-quadric library
pub type QuadricResult<T> = Result<T, QuadricError>;

/// Main error type for the apex-quadric library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadricError {
    /// Radii are non-positive (or non-finite), or a matrix cannot be constrained to an ellipsoid
    #[error("Invalid quadric shape: {0}")]
    InvalidShape(String),

    /// The quadric centroid has non-positive depth in the camera frame
    #[error("Quadric is behind the camera: {0}")]
    BehindCamera(String),

    /// The projected conic is not a proper, real ellipse
    #[error("Degenerate conic: {0}")]
    DegenerateConic(String),

    /// Malformed parameter vectors or calibration values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No variable stored under the requested key
    #[error("Missing variable: {key}")]
    MissingVariable { key: String },

    /// A variable exists under the key but holds a different type
    #[error("Type mismatch for variable {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Manifold operation errors
    #[error("Manifold error: {0}")]
    Manifold(String),
}

impl QuadricError {
    /// Whether the optimizer can recover from this error by substituting a fallback value.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QuadricError::BehindCamera(_) | QuadricError::DegenerateConic(_)
        )
    }
}

impl From<ManifoldError> for QuadricError {
    fn from(err: ManifoldError) -> Self {
        QuadricError::Manifold(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadric_error_display() {
        let error = QuadricError::InvalidShape("radius 0 must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid quadric shape: radius 0 must be positive"
        );

        let error = QuadricError::TypeMismatch {
            key: "q0".to_string(),
            expected: "ConstrainedDualQuadric",
            found: "SE3",
        };
        assert_eq!(
            error.to_string(),
            "Type mismatch for variable q0: expected ConstrainedDualQuadric, found SE3"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(QuadricError::BehindCamera("z = -1".into()).is_recoverable());
        assert!(QuadricError::DegenerateConic("rank 2".into()).is_recoverable());
        assert!(!QuadricError::InvalidShape("r = 0".into()).is_recoverable());
        assert!(
            !QuadricError::MissingVariable {
                key: "x1".to_string()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_quadric_error_from_manifold() {
        let manifold_error = ManifoldError::InvalidTangentDimension {
            expected: 9,
            actual: 6,
        };
        match QuadricError::from(manifold_error) {
            QuadricError::Manifold(msg) => assert!(msg.contains("expected 9")),
            other => panic!("Expected manifold error, got {other:?}"),
        }
    }

    #[test]
    fn test_quadric_result_err() {
        let result: QuadricResult<i32> = Err(QuadricError::DegenerateConic("test".to_string()));
        assert!(result.is_err());
    }
}
