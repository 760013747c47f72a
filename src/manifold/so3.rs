//! SO(3) - Special Orthogonal Group in 3D
//!
//! SO(3) elements are stored as nalgebra `UnitQuaternion<f64>`; tangent elements are
//! axis-angle vectors in R³ whose direction is the rotation axis and whose magnitude is
//! the rotation angle.

use crate::manifold::{LieGroup, Tangent};
use crate::utils::skew_symmetric;
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use std::fmt;

/// SO(3) group element representing rotations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

/// SO(3) tangent space element: axis-angle vector [θx, θy, θz].
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl fmt::Display for SO3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3 {
    /// Create a new SO(3) element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from (possibly unnormalized) quaternion coefficients.
    pub fn from_quaternion_coeffs(w: f64, x: f64, y: f64, z: f64) -> Self {
        SO3::new(UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
    }

    /// Create SO(3) from roll, pitch and yaw angles (radians).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from an axis-angle vector.
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    /// Create SO(3) from a rotation matrix.
    ///
    /// The matrix must already be orthonormal with determinant +1.
    pub fn from_rotation_matrix(matrix: &Matrix3<f64>) -> Self {
        let rotation = Rotation3::from_matrix_unchecked(*matrix);
        SO3::new(UnitQuaternion::from_rotation_matrix(&rotation))
    }

    /// Get the quaternion representation.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the 3x3 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;

    const DOF: usize = 3;
    const REP_SIZE: usize = 4;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn inverse(&self) -> Self {
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    fn log(&self) -> Self::TangentVector {
        SO3Tangent::new(self.quaternion.scaled_axis())
    }

    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion.transform_vector(vector)
    }
}

impl SO3Tangent {
    /// Create a tangent element from an axis-angle vector.
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    /// Axis-angle coefficients.
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// J_l(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    ///
    /// This is the V matrix mapping the translational tangent of SE(3) to a translation.
    pub fn left_jacobian(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let theta_skew = skew_symmetric(&self.data);

        if theta_squared <= f64::EPSILON {
            return Matrix3::identity()
                + 0.5 * theta_skew
                + (1.0 / 6.0) * theta_skew * theta_skew;
        }

        // 1 - cos θ = 2 sin²(θ/2)
        let theta = theta_squared.sqrt();
        let half_sin = (0.5 * theta).sin();
        Matrix3::identity()
            + 2.0 * half_sin * half_sin / theta_squared * theta_skew
            + (theta - theta.sin()) / (theta_squared * theta) * theta_skew * theta_skew
    }

    /// J_l⁻¹(θ) = I - ½[θ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [θ]ₓ²
    pub fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let theta_skew = skew_symmetric(&self.data);

        if theta_squared <= f64::EPSILON {
            return Matrix3::identity()
                - 0.5 * theta_skew
                + (1.0 / 12.0) * theta_skew * theta_skew;
        }

        let theta = theta_squared.sqrt();
        Matrix3::identity() - 0.5 * theta_skew
            + (1.0 / theta_squared - (1.0 + theta.cos()) / (2.0 * theta * theta.sin()))
                * theta_skew
                * theta_skew
    }
}

impl Tangent<SO3> for SO3Tangent {
    fn exp(&self) -> SO3 {
        SO3::from_scaled_axis(self.data)
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn test_so3_identity_act() {
        let identity = SO3::identity();
        let v = Vector3::new(1.0, -2.0, 3.0);
        assert!((identity.act(&v) - v).norm() < TOLERANCE);
        assert_eq!(identity.rotation_matrix(), Matrix3::identity());
    }

    #[test]
    fn test_so3_rotation_about_z() {
        let rotation = SO3::from_scaled_axis(Vector3::new(0.0, 0.0, FRAC_PI_2));
        let rotated = rotation.act(&Vector3::x());
        assert!((rotated - Vector3::y()).norm() < TOLERANCE);
        assert!((rotation.rotation_matrix() * Vector3::x() - rotated).norm() < TOLERANCE);
    }

    #[test]
    fn test_so3_exp_log_round_trip() {
        let tangent = SO3Tangent::new(Vector3::new(0.3, -0.2, 0.7));
        let recovered = tangent.exp().log();
        assert!((recovered.coeffs() - tangent.coeffs()).norm() < 1e-12);
        assert!((recovered.angle() - tangent.coeffs().norm()).abs() < 1e-12);
    }

    #[test]
    fn test_so3_inverse_compose_is_identity() {
        let rotation = SO3::from_euler_angles(0.1, 0.4, -0.8);
        let product = rotation.compose(&rotation.inverse());
        assert!(product.log().is_zero(1e-12));
    }

    #[test]
    fn test_so3_minus_recovers_plus() {
        let base = SO3::from_euler_angles(0.5, -0.3, 1.2);
        let delta = SO3Tangent::new(Vector3::new(0.05, 0.02, -0.04));
        let moved = base.plus(&delta);
        let recovered = moved.minus(&base);
        assert!((recovered.coeffs() - delta.coeffs()).norm() < 1e-12);
    }

    #[test]
    fn test_so3_left_jacobian_inverse() {
        let tangent = SO3Tangent::new(Vector3::new(0.4, 0.9, -0.3));
        let product = tangent.left_jacobian() * tangent.left_jacobian_inv();
        assert!((product - Matrix3::identity()).norm() < 1e-10);

        let small = SO3Tangent::new(Vector3::new(1e-9, -2e-9, 0.0));
        let product = small.left_jacobian() * small.left_jacobian_inv();
        assert!((product - Matrix3::identity()).norm() < 1e-10);
    }

    #[test]
    fn test_so3_left_jacobian_numerical() {
        // exp(θ + δ) ≈ exp(Jl δ) ∘ exp(θ)
        let tangent = SO3Tangent::new(Vector3::new(0.2, -0.5, 0.8));
        let jl = tangent.left_jacobian();
        let h = 1e-6;
        for i in 0..3 {
            let mut perturbed = tangent.coeffs();
            perturbed[i] += h;
            let delta = SO3Tangent::new(perturbed)
                .exp()
                .compose(&tangent.exp().inverse())
                .log()
                .coeffs()
                / h;
            assert!((delta - jl.column(i)).norm() < 1e-5, "column {i}: {delta}");
        }
    }

    #[test]
    fn test_so3_from_rotation_matrix() {
        let rotation = SO3::from_euler_angles(0.7, -0.1, 2.0);
        let recovered = SO3::from_rotation_matrix(&rotation.rotation_matrix());
        assert!(rotation.inverse().compose(&recovered).log().is_zero(1e-10));
    }
}
