//! SE(3) - Special Euclidean Group in 3D
//!
//! This module implements the Special Euclidean group SE(3), which represents
//! rigid body transformations in 3D space (rotation + translation). Camera poses and
//! quadric poses are both SE(3) elements.
//!
//! SE(3) elements are represented as a combination of SO(3) rotation and Vector3 translation.
//! SE(3) tangent elements are represented as [rho(3), theta(3)] = 6 components,
//! where rho is the translational component and theta is the rotational component.
//!
//! The representation vector used by factors is `[tx, ty, tz, qw, qx, qy, qz]`.

use crate::manifold::so3::{SO3, SO3Tangent};
use crate::manifold::{
    LieGroup, Manifold, ManifoldError, ManifoldResult, Tangent, check_tangent_dimension,
};
use nalgebra::{DVector, Isometry3, Matrix3, Matrix4, Quaternion, Translation3,
    UnitQuaternion, Vector3, Vector6};
use std::fmt;

/// SE(3) group element representing rigid body transformations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        let q = self.rotation_quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

/// SE(3) tangent space element `[rho_x, rho_y, rho_z, theta_x, theta_y, theta_z]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl fmt::Display for SE3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rho = self.rho();
        let theta = self.theta();
        write!(
            f,
            "se3(rho: [{:.4}, {:.4}, {:.4}], theta: [{:.4}, {:.4}, {:.4}])",
            rho.x, rho.y, rho.z, theta.x, theta.y, theta.z
        )
    }
}

impl SE3 {
    /// Create a new SE3 element from translation and rotation.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::new(rotation),
            translation,
        }
    }

    /// Create SE3 from a translation and (possibly unnormalized) quaternion.
    pub fn from_translation_quaternion(translation: Vector3<f64>, quaternion: Quaternion<f64>) -> Self {
        Self::new(translation, UnitQuaternion::from_quaternion(quaternion))
    }

    /// Create SE3 from translation components and Euler angles.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Create SE3 from SO3 and Vector3 components.
    pub fn from_translation_so3(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Create SE3 directly from an Isometry3.
    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        SE3 {
            rotation: SO3::new(isometry.rotation),
            translation: isometry.translation.vector,
        }
    }

    /// Camera-to-world pose at `eye` whose optical (+z) axis points at `target`.
    ///
    /// `up` fixes the roll; the camera's -y axis is aligned with it as closely as possible.
    /// Returns `None` when `eye == target` or `up` is parallel to the viewing direction.
    pub fn look_at(eye: Vector3<f64>, target: Vector3<f64>, up: Vector3<f64>) -> Option<Self> {
        let z_axis = (target - eye).try_normalize(1e-12)?;
        let x_axis = (-up).cross(&z_axis).try_normalize(1e-12)?;
        let y_axis = z_axis.cross(&x_axis);
        let rotation = Matrix3::from_columns(&[x_axis, y_axis, z_axis]);
        Some(Self::from_translation_so3(
            eye,
            SO3::from_rotation_matrix(&rotation),
        ))
    }

    /// Get the translation part as a Vector3.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Get the rotation part as SO3.
    pub fn rotation_so3(&self) -> SO3 {
        self.rotation.clone()
    }

    /// Get the rotation part as a UnitQuaternion.
    pub fn rotation_quaternion(&self) -> UnitQuaternion<f64> {
        self.rotation.quaternion()
    }

    /// Get the rotation part as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    /// Get as an Isometry3.
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation_quaternion(),
        )
    }

    /// Get the transformation matrix (4x4 homogeneous matrix).
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Map a world point into this frame: `R^T (p - t)`.
    pub fn transform_to(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse().act(&(point - self.translation))
    }
}

impl From<SE3> for DVector<f64> {
    fn from(se3: SE3) -> Self {
        let q = se3.rotation_quaternion();
        DVector::from_vec(vec![
            se3.translation.x,
            se3.translation.y,
            se3.translation.z,
            q.w,
            q.i,
            q.j,
            q.k,
        ])
    }
}

impl TryFrom<&DVector<f64>> for SE3 {
    type Error = ManifoldError;

    fn try_from(data: &DVector<f64>) -> ManifoldResult<Self> {
        if data.len() != SE3::REP_SIZE {
            return Err(ManifoldError::InvalidRepresentationDimension {
                expected: SE3::REP_SIZE,
                actual: data.len(),
            });
        }
        let quaternion = Quaternion::new(data[3], data[4], data[5], data[6]);
        if quaternion.norm() < f64::EPSILON {
            return Err(ManifoldError::InvalidElement(
                "zero-norm quaternion".to_string(),
            ));
        }
        Ok(SE3::from_translation_quaternion(
            Vector3::new(data[0], data[1], data[2]),
            quaternion,
        ))
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;

    const DOF: usize = 6;
    const REP_SIZE: usize = 7;

    fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// M⁻¹ = [ Rᵀ -Rᵀt ; 0 1 ]
    fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        let trans_inv = -rot_inv.act(&self.translation);
        SE3::from_translation_so3(trans_inv, rot_inv)
    }

    /// M_a M_b = [ R_a R_b  R_a t_b + t_a ; 0 1 ]
    fn compose(&self, other: &Self) -> Self {
        let composed_rotation = self.rotation.compose(&other.rotation);
        let composed_translation = self.rotation.act(&other.translation) + self.translation;
        SE3::from_translation_so3(composed_translation, composed_rotation)
    }

    /// τ = log(M) = [ V⁻¹(θ) t ; Log(R) ], V(θ) = J_l(θ)
    fn log(&self) -> Self::TangentVector {
        let theta = self.rotation.log();
        let rho = theta.left_jacobian_inv() * self.translation;
        SE3Tangent::new(rho, theta.coeffs())
    }

    /// Apply the transformation `R v + t`.
    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(vector) + self.translation
    }
}

impl Manifold for SE3 {
    const DOF: usize = 6;

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        check_tangent_dimension(delta, <Self as Manifold>::DOF)?;
        Ok(self.plus(&SE3Tangent::from(delta)))
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        other.minus(self).into()
    }
}

impl SE3Tangent {
    /// Create a new SE3Tangent from rho (translational) and theta (rotational) components.
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        let mut data = Vector6::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&rho);
        data.fixed_rows_mut::<3>(3).copy_from(&theta);
        SE3Tangent { data }
    }

    /// Get the rho (translational) part.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Get the theta (rotational) part.
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Raw `[rho, theta]` coefficients.
    pub fn coeffs(&self) -> Vector6<f64> {
        self.data
    }
}

impl From<&DVector<f64>> for SE3Tangent {
    fn from(data: &DVector<f64>) -> Self {
        SE3Tangent {
            data: Vector6::new(data[0], data[1], data[2], data[3], data[4], data[5]),
        }
    }
}

impl From<SE3Tangent> for DVector<f64> {
    fn from(tangent: SE3Tangent) -> Self {
        DVector::from_column_slice(tangent.data.as_slice())
    }
}

impl Tangent<SE3> for SE3Tangent {
    /// M = exp(τ) = [ R(θ)  J_l(θ) ρ ; 0 1 ]
    fn exp(&self) -> SE3 {
        let theta_tangent = SO3Tangent::new(self.theta());
        let rotation = theta_tangent.exp();
        let translation = theta_tangent.left_jacobian() * self.rho();
        SE3::from_translation_so3(translation, rotation)
    }

    fn zero() -> Self {
        SE3Tangent {
            data: Vector6::zeros(),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}
