//! Projection of dual quadrics through a pinhole camera.
//!
//! # Projection Model
//!
//! ```text
//! P  = K · [I | 0] · T⁻¹          (T: camera-to-world pose)
//! C* = P · Q* · Pᵀ
//! ```
//!
//! The camera looks down its +z axis; quadrics whose centroid has non-positive depth are
//! rejected with [`QuadricError::BehindCamera`].
//!
//! # Jacobians
//!
//! With `vec` the column-major flattening:
//! ```text
//! ∂C*/∂q_k      = P · ∂Q*/∂q_k · Pᵀ
//! ∂C*/∂ξ_j      = dP_j Q* Pᵀ + P Q* dP_jᵀ,   dP_j = -K [I | 0] G_j T⁻¹
//! ```
//! where `G_j` are the se(3) generators in the `[ρ, θ]` order of
//! [`crate::manifold::se3::SE3Tangent`] and the pose is perturbed on the right.

use crate::error::{QuadricError, QuadricResult};
use crate::geometry::{
    AlignedBox2, Calibration, ConstrainedDualQuadric, DualConic, Matrix4x9, Matrix9, Matrix9x6,
    Matrix16x9,
};
use crate::manifold::LieGroup;
use crate::manifold::se3::SE3;
use crate::utils::se3_generator;
use nalgebra::{Matrix3x4, Matrix4, Matrix4x6};

/// Stateless projection operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadricCamera;

impl QuadricCamera {
    /// Camera projection matrix `P = K · [I | 0] · T⁻¹`.
    pub fn transform_to_image(camera_pose: &SE3, calibration: &Calibration) -> Matrix3x4<f64> {
        calibration.k() * Matrix3x4::identity() * camera_pose.inverse().matrix()
    }

    /// Project `quadric` into the image of a camera at `camera_pose`.
    ///
    /// `jacobian_quadric` receives ∂vec(C*)/∂(quadric tangent) and `jacobian_pose`
    /// receives ∂vec(C*)/∂(pose tangent).
    ///
    /// # Errors
    /// [`QuadricError::BehindCamera`] if the quadric centroid has non-positive depth.
    pub fn project(
        quadric: &ConstrainedDualQuadric,
        camera_pose: &SE3,
        calibration: &Calibration,
        jacobian_quadric: Option<&mut Matrix9>,
        jacobian_pose: Option<&mut Matrix9x6>,
    ) -> QuadricResult<DualConic> {
        if quadric.is_behind(camera_pose) {
            let depth = camera_pose.transform_to(&quadric.centroid()).z;
            return Err(QuadricError::BehindCamera(format!(
                "centroid depth {depth:.4} in camera frame"
            )));
        }

        let projection = Self::transform_to_image(camera_pose, calibration);
        let mut quadric_jacobian = Matrix16x9::zeros();
        let dual_quadric = if jacobian_quadric.is_some() {
            quadric.matrix(Some(&mut quadric_jacobian))
        } else {
            quadric.matrix(None)
        };
        let conic = projection * dual_quadric * projection.transpose();

        if let Some(jac) = jacobian_quadric {
            for k in 0..9 {
                let d_quadric = Matrix4::from_iterator(quadric_jacobian.column(k).iter().copied());
                let d_conic = projection * d_quadric * projection.transpose();
                jac.column_mut(k).copy_from_slice(d_conic.as_slice());
            }
        }

        if let Some(jac) = jacobian_pose {
            let world_to_camera: Matrix4<f64> = camera_pose.inverse().matrix();
            let intrinsic: Matrix3x4<f64> = calibration.k() * Matrix3x4::identity();
            let q_pt = dual_quadric * projection.transpose();
            for j in 0..6 {
                let d_projection = -(intrinsic * se3_generator(j) * world_to_camera);
                let d_conic = d_projection * q_pt;
                let d_conic = d_conic + d_conic.transpose();
                jac.column_mut(j).copy_from_slice(d_conic.as_slice());
            }
        }

        Ok(DualConic::from_matrix(conic))
    }

    /// Project `quadric` and reduce the conic to its bounding box.
    ///
    /// Jacobians are ∂(xmin, ymin, xmax, ymax) with respect to the quadric and pose
    /// tangents.
    ///
    /// # Errors
    /// [`QuadricError::BehindCamera`] or [`QuadricError::DegenerateConic`].
    pub fn project_bounds(
        quadric: &ConstrainedDualQuadric,
        camera_pose: &SE3,
        calibration: &Calibration,
        jacobian_quadric: Option<&mut Matrix4x9>,
        jacobian_pose: Option<&mut Matrix4x6<f64>>,
    ) -> QuadricResult<AlignedBox2> {
        if jacobian_quadric.is_none() && jacobian_pose.is_none() {
            return Self::project(quadric, camera_pose, calibration, None, None)?.bounds(None);
        }

        let mut conic_quadric = Matrix9::zeros();
        let mut conic_pose = Matrix9x6::zeros();
        let conic = Self::project(
            quadric,
            camera_pose,
            calibration,
            Some(&mut conic_quadric),
            Some(&mut conic_pose),
        )?;
        let mut box_conic = Matrix4x9::zeros();
        let bounds = conic.bounds(Some(&mut box_conic))?;

        if let Some(jac) = jacobian_quadric {
            *jac = box_conic * conic_quadric;
        }
        if let Some(jac) = jacobian_pose {
            *jac = box_conic * conic_pose;
        }
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::Manifold;
    use crate::utils::numerical_jacobian_manifold;
    use nalgebra::{DMatrix, DVector, Vector3};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn calibration() -> Calibration {
        Calibration::new(500.0, 500.0, 320.0, 240.0)
    }

    fn camera_at(z: f64) -> SE3 {
        SE3::from_translation_euler(0.0, 0.0, z, 0.0, 0.0, 0.0)
    }

    fn assert_jacobian_close(analytic: &DMatrix<f64>, numerical: &DMatrix<f64>) {
        let scale = numerical.amax().max(1.0);
        let error = (analytic - numerical).amax();
        assert!(
            error < 1e-6 * scale,
            "max error {error} (scale {scale})\nanalytic {analytic}\nnumerical {numerical}"
        );
    }

    #[test]
    fn test_transform_to_image_projects_points() {
        let pose = SE3::from_translation_euler(0.5, -0.2, -3.0, 0.05, -0.1, 0.2);
        let projection = QuadricCamera::transform_to_image(&pose, &calibration());
        let world = Vector3::new(0.3, 0.1, 1.0);
        let homogeneous = projection * world.push(1.0);
        let pixel = homogeneous.xy() / homogeneous.z;

        let camera = pose.transform_to(&world);
        assert!((pixel.x - (500.0 * camera.x / camera.z + 320.0)).abs() < 1e-9);
        assert!((pixel.y - (500.0 * camera.y / camera.z + 240.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unit_sphere_projection() -> TestResult {
        let bounds = QuadricCamera::project_bounds(
            &ConstrainedDualQuadric::default(),
            &camera_at(-5.0),
            &calibration(),
            None,
            None,
        )?;
        let half = 500.0 / 24.0_f64.sqrt();
        let expected = AlignedBox2::new(320.0 - half, 240.0 - half, 320.0 + half, 240.0 + half)?;
        assert!(bounds.equals(&expected, 1e-9), "{bounds}");
        Ok(())
    }

    #[test]
    fn test_projection_is_symmetric_ellipse() -> TestResult {
        let quadric = ConstrainedDualQuadric::new(
            SE3::from_translation_euler(0.3, -0.2, 4.0, 0.4, 0.1, -0.3),
            Vector3::new(0.5, 0.8, 0.3),
        )?;
        let conic = QuadricCamera::project(&quadric, &SE3::identity(), &calibration(), None, None)?;
        let matrix = conic.matrix();
        assert!((matrix - matrix.transpose()).amax() < 1e-9 * matrix.amax());
        assert!(conic.is_ellipse());
        Ok(())
    }

    #[test]
    fn test_small_distant_quadrics_project_to_ellipses() -> TestResult {
        // A 0.25 m sphere 200 m away, well off the optical axis of an HD camera.
        let hd = Calibration::new(1500.0, 1500.0, 960.0, 540.0);
        let sphere = ConstrainedDualQuadric::new(
            SE3::from_translation_euler(100.0, 0.0, 200.0, 0.0, 0.0, 0.0),
            Vector3::repeat(0.25),
        )?;
        let conic = QuadricCamera::project(&sphere, &SE3::identity(), &hd, None, None)?;
        assert!(!conic.is_degenerate());
        assert!(conic.is_ellipse());
        let bounds = QuadricCamera::project_bounds(&sphere, &SE3::identity(), &hd, None, None)?;
        assert!((bounds.center().x - 1710.0).abs() < 0.05, "{bounds}");
        assert!((bounds.center().y - 540.0).abs() < 1e-6, "{bounds}");
        assert!(bounds.width() > 3.5 && bounds.width() < 4.5, "{bounds}");

        // Pixel and sub-pixel silhouettes stay valid too.
        let vga = Calibration::new(525.0, 525.0, 319.5, 239.5);
        for (calibration, x, y, z, radius) in [
            (hd, 50.0, 10.0, 100.0, 0.05),
            (vga, 30.0, -20.0, 100.0, 0.03),
            (vga, -40.0, 25.0, 95.0, 0.05),
        ] {
            let quadric = ConstrainedDualQuadric::new(
                SE3::from_translation_euler(x, y, z, 0.3, -0.2, 0.1),
                Vector3::new(radius, 0.5 * radius, 0.8 * radius),
            )?;
            let bounds =
                QuadricCamera::project_bounds(&quadric, &SE3::identity(), &calibration, None, None)?;
            let expected_u = calibration.fx * x / z + calibration.cx;
            assert!((bounds.center().x - expected_u).abs() < 0.5, "{bounds}");
            assert!(bounds.width() > 0.0 && bounds.width() < 2.0, "{bounds}");
        }
        Ok(())
    }

    #[test]
    fn test_behind_camera_is_rejected() {
        let result = QuadricCamera::project(
            &ConstrainedDualQuadric::default(),
            &camera_at(5.0),
            &calibration(),
            None,
            None,
        );
        assert!(matches!(result, Err(QuadricError::BehindCamera(_))));
    }

    #[test]
    fn test_camera_inside_quadric_is_not_an_ellipse() -> TestResult {
        // The centroid is in front but the camera sits inside the ellipsoid.
        let quadric = ConstrainedDualQuadric::new(
            SE3::from_translation_euler(0.0, 0.0, 0.5, 0.0, 0.0, 0.0),
            Vector3::repeat(2.0),
        )?;
        let result =
            QuadricCamera::project_bounds(&quadric, &SE3::identity(), &calibration(), None, None);
        assert!(matches!(result, Err(QuadricError::DegenerateConic(_))));
        Ok(())
    }

    #[test]
    fn test_conic_jacobians_match_numerical() -> TestResult {
        let quadric = ConstrainedDualQuadric::new(
            SE3::from_translation_euler(0.4, 0.1, 3.0, 0.2, -0.3, 0.5),
            Vector3::new(0.3, 0.5, 0.7),
        )?;
        let pose = SE3::from_translation_euler(0.1, -0.2, -1.0, 0.05, 0.1, -0.02);
        let calibration = calibration();

        let mut jac_quadric = Matrix9::zeros();
        let mut jac_pose = Matrix9x6::zeros();
        QuadricCamera::project(
            &quadric,
            &pose,
            &calibration,
            Some(&mut jac_quadric),
            Some(&mut jac_pose),
        )?;

        let conic_of = |q: &ConstrainedDualQuadric, p: &SE3| {
            QuadricCamera::project(q, p, &calibration, None, None)
                .map(|c| DVector::from_column_slice(c.matrix().as_slice()))
                .unwrap_or_else(|_| DVector::zeros(9))
        };
        let numerical_quadric =
            numerical_jacobian_manifold(|q: &ConstrainedDualQuadric| conic_of(q, &pose), &quadric, 1e-6)?;
        let numerical_pose = numerical_jacobian_manifold(|p: &SE3| conic_of(&quadric, p), &pose, 1e-6)?;

        assert_jacobian_close(
            &DMatrix::from_column_slice(9, 9, jac_quadric.as_slice()),
            &numerical_quadric,
        );
        assert_jacobian_close(
            &DMatrix::from_column_slice(9, 6, jac_pose.as_slice()),
            &numerical_pose,
        );
        Ok(())
    }

    #[test]
    fn test_bounds_jacobians_match_numerical() -> TestResult {
        let quadric = ConstrainedDualQuadric::new(
            SE3::from_translation_euler(-0.5, 0.3, 4.0, -0.2, 0.6, 0.1),
            Vector3::new(0.6, 0.4, 0.9),
        )?;
        let pose = SE3::from_translation_euler(0.2, 0.0, -0.5, -0.05, 0.08, 0.3);
        let calibration = calibration();

        let mut jac_quadric = Matrix4x9::zeros();
        let mut jac_pose = Matrix4x6::zeros();
        let bounds = QuadricCamera::project_bounds(
            &quadric,
            &pose,
            &calibration,
            Some(&mut jac_quadric),
            Some(&mut jac_pose),
        )?;
        let plain = QuadricCamera::project_bounds(&quadric, &pose, &calibration, None, None)?;
        assert_eq!(bounds, plain);

        let bounds_of = |q: &ConstrainedDualQuadric, p: &SE3| {
            QuadricCamera::project_bounds(q, p, &calibration, None, None)
                .map(|b| DVector::from_column_slice(b.vector().as_slice()))
                .unwrap_or_else(|_| DVector::zeros(4))
        };
        let numerical_quadric =
            numerical_jacobian_manifold(|q: &ConstrainedDualQuadric| bounds_of(q, &pose), &quadric, 1e-6)?;
        let numerical_pose = numerical_jacobian_manifold(|p: &SE3| bounds_of(&quadric, p), &pose, 1e-6)?;

        assert_jacobian_close(
            &DMatrix::from_column_slice(4, 9, jac_quadric.as_slice()),
            &numerical_quadric,
        );
        assert_jacobian_close(
            &DMatrix::from_column_slice(4, 6, jac_pose.as_slice()),
            &numerical_pose,
        );
        assert_eq!(<SE3 as Manifold>::DOF, 6);
        Ok(())
    }
}
