//! Integration tests for the quadric manifold and its projection into cameras.
//!
//! Configurations are sampled with a seeded RNG; each test checks a geometric property
//! that must hold for every sample rather than a single hand-picked case.

use apex_quadric::factors::{BoundingBoxFactor, DEFAULT_FALLBACK_ERROR};
use apex_quadric::geometry::{ConstrainedDualQuadric, Matrix4x9, QuadricCamera};
use apex_quadric::manifold::se3::SE3;
use apex_quadric::manifold::{LieGroup, Manifold};
use apex_quadric::QuadricError;
use nalgebra::{DVector, Matrix4x6, Vector3, Vector4};

use quadric_test_utils::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_retract_local_coordinates_inverse_on_random_quadrics() -> TestResult {
    let mut rng = rng(7);
    for _ in 0..50 {
        let quadric = random_quadric(&mut rng);
        let delta = random_tangent(&mut rng, 9, 0.3);
        let moved = quadric.retract(&delta)?;
        let recovered = quadric.local_coordinates(&moved);
        assert!(
            (&recovered - &delta).amax() < 1e-9,
            "delta {delta} recovered {recovered}"
        );
        assert!(quadric.local_coordinates(&quadric).amax() < 1e-12);
        assert!(moved.radii().iter().all(|&r| r > 0.0));
    }
    Ok(())
}

#[test]
fn test_origin_chart_round_trip() -> TestResult {
    let mut rng = rng(11);
    for _ in 0..20 {
        let delta = random_tangent(&mut rng, 9, 0.5);
        let quadric = ConstrainedDualQuadric::retract_at_origin(&delta)?;
        let recovered = ConstrainedDualQuadric::local_coordinates_at_origin(&quadric);
        assert!((recovered - delta).amax() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_constrain_recovers_random_quadrics() -> TestResult {
    let mut rng = rng(3);
    for _ in 0..20 {
        let quadric = random_quadric(&mut rng);
        let scaled = quadric.matrix(None) * -3.7;
        let recovered = ConstrainedDualQuadric::constrain(&scaled)?;
        let error = (recovered.normalized_matrix() - quadric.normalized_matrix()).amax();
        assert!(error < 1e-8, "normalized matrices differ by {error}");
        assert!((recovered.centroid() - quadric.centroid()).norm() < 1e-8);

        let mut sorted_expected: Vec<f64> = quadric.radii().iter().copied().collect();
        let mut sorted_recovered: Vec<f64> = recovered.radii().iter().copied().collect();
        sorted_expected.sort_by(f64::total_cmp);
        sorted_recovered.sort_by(f64::total_cmp);
        for (a, b) in sorted_expected.iter().zip(&sorted_recovered) {
            assert!((a - b).abs() < 1e-8);
        }
    }
    Ok(())
}

#[test]
fn test_representation_vector_round_trip() -> TestResult {
    let mut rng = rng(5);
    let quadric = random_quadric(&mut rng);
    let vector: DVector<f64> = quadric.clone().into();
    assert_eq!(vector.len(), 10);
    let parsed = ConstrainedDualQuadric::try_from(&vector)?;
    assert!(parsed.equals(&quadric, 1e-12));

    let mut bad = vector.clone();
    bad[8] = 0.0;
    assert!(matches!(
        ConstrainedDualQuadric::try_from(&bad),
        Err(QuadricError::InvalidShape(_))
    ));
    Ok(())
}

#[test]
fn test_projected_silhouette_lies_in_bounds() -> TestResult {
    let mut rng = rng(17);
    let calibration = calibration();
    for _ in 0..25 {
        let quadric = random_quadric(&mut rng);
        let camera = camera_looking_at(&mut rng, &quadric.centroid(), 7.0);
        assert!(!quadric.is_behind(&camera));

        let conic = QuadricCamera::project(&quadric, &camera, &calibration, None, None)?;
        assert!(conic.is_ellipse());
        let bounds = conic.bounds(None)?;
        let projection = QuadricCamera::transform_to_image(&camera, &calibration);

        let project = |world: Vector3<f64>| {
            let image = projection * Vector4::new(world.x, world.y, world.z, 1.0);
            nalgebra::Vector2::new(image.x / image.z, image.y / image.z)
        };

        let centre = project(quadric.centroid());
        assert!(bounds.contains_point(&centre));

        // Points on the surface project inside the box.
        let rotation = quadric.pose().rotation_matrix();
        for i in 0..40 {
            let theta = i as f64 * 0.37;
            let phi = (i as f64 * 0.61).sin() * std::f64::consts::FRAC_PI_2;
            let local = Vector3::new(
                phi.cos() * theta.cos(),
                phi.cos() * theta.sin(),
                phi.sin(),
            )
            .component_mul(&quadric.radii());
            let pixel = project(quadric.centroid() + rotation * local);
            let tolerance = 1e-6 * bounds.width().max(bounds.height());
            assert!(pixel.x >= bounds.xmin() - tolerance && pixel.x <= bounds.xmax() + tolerance);
            assert!(pixel.y >= bounds.ymin() - tolerance && pixel.y <= bounds.ymax() + tolerance);
        }
    }
    Ok(())
}

#[test]
fn test_small_distant_off_centre_quadrics_project_to_ellipses() -> TestResult {
    let mut rng = rng(29);
    for calibration in [hd_calibration(), calibration()] {
        for _ in 0..200 {
            let quadric = random_distant_quadric(&mut rng, &calibration);
            let camera = SE3::identity();
            let conic = QuadricCamera::project(&quadric, &camera, &calibration, None, None)?;
            assert!(conic.is_ellipse(), "{quadric} gives {conic}");

            let predicted = QuadricCamera::project_bounds(&quadric, &camera, &calibration, None, None)?;
            let centroid = quadric.centroid();
            let u = calibration.fx * centroid.x / centroid.z + calibration.cx;
            assert!(predicted.xmin() < u && u < predicted.xmax(), "{predicted} vs u = {u}");

            let factor = BoundingBoxFactor::new(predicted, calibration, "x0", "q0");
            let mut h_pose = Matrix4x6::zeros();
            let mut h_quadric = Matrix4x9::zeros();
            let error =
                factor.evaluate_error(&camera, &quadric, Some(&mut h_pose), Some(&mut h_quadric));
            assert!(error.amax() < 1e-9, "{quadric}: error {error}");
            assert!(error.amax() < DEFAULT_FALLBACK_ERROR);
            assert!(h_quadric.amax() > 0.0, "{quadric}: zero quadric Jacobian");
            assert!(h_pose.amax() > 0.0, "{quadric}: zero pose Jacobian");
        }
    }
    Ok(())
}

#[test]
fn test_projection_is_invariant_to_quadric_scale_sign() -> TestResult {
    let mut rng = rng(23);
    let quadric = random_quadric(&mut rng);
    let camera = camera_looking_at(&mut rng, &quadric.centroid(), 6.0);
    let conic = QuadricCamera::project(&quadric, &camera, &calibration(), None, None)?;

    let normalized = conic.normalize();
    assert!((normalized.matrix()[(2, 2)] - 1.0).abs() < 1e-12);
    assert!(conic.bounds(None)?.equals(&normalized.bounds(None)?, 1e-9));
    Ok(())
}

#[test]
fn test_world_bounds_contain_surface_points() {
    let mut rng = rng(29);
    for _ in 0..10 {
        let quadric = random_quadric(&mut rng);
        let bounds = quadric.bounds();
        let rotation = quadric.pose().rotation_matrix();
        for i in 0..30 {
            let direction = random_vector3(&mut rng, 1.0);
            let Some(direction) = direction.try_normalize(1e-9) else {
                continue;
            };
            let point = quadric.centroid() + rotation * direction.component_mul(&quadric.radii());
            let slack = Vector3::repeat(1e-9);
            assert!(
                (point - bounds.min() + slack).iter().all(|&v| v >= 0.0)
                    && (bounds.max() - point + slack).iter().all(|&v| v >= 0.0),
                "sample {i} outside {bounds}"
            );
        }
    }
}

#[test]
fn test_camera_inside_quadric_is_rejected() {
    let quadric = ConstrainedDualQuadric::default();
    let camera = SE3::from_translation_euler(0.0, 0.0, -0.5, 0.0, 0.0, 0.0);
    assert!(quadric.contains_pose(&camera));
    assert!(
        QuadricCamera::project_bounds(&quadric, &camera, &calibration(), None, None).is_err()
    );
}

#[test]
fn test_equals_uses_unnormalized_absolute_comparison() -> TestResult {
    let small = ConstrainedDualQuadric::default();
    let nudged =
        small.retract(&DVector::from_vec(vec![0.0, 0.0, 0.0, 1e-6, 0.0, 0.0, 0.0, 0.0, 0.0]))?;
    assert!(small.equals(&nudged, 1e-5));

    // The same relative change on a large, distant quadric exceeds the absolute tolerance.
    let large = ConstrainedDualQuadric::new(
        SE3::from_translation_euler(1000.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        Vector3::new(100.0, 100.0, 100.0),
    )?;
    let large_nudged =
        large.retract(&DVector::from_vec(vec![0.0, 0.0, 0.0, 1e-4, 0.0, 0.0, 0.0, 0.0, 0.0]))?;
    assert!(!large.equals(&large_nudged, 1e-5));
    Ok(())
}
