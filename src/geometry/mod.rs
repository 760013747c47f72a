//! Quadric geometry: ellipsoids, their image-space projections and bounding boxes.
//!
//! - [`ConstrainedDualQuadric`]: ellipsoid variable on a 9-dof manifold
//! - [`QuadricCamera`]: projects a dual quadric through a pinhole camera
//! - [`DualConic`]: the projected silhouette, reducible to an [`AlignedBox2`]
//! - [`AlignedBox2`] / [`AlignedBox3`]: axis-aligned boxes
//! - [`Calibration`]: pinhole intrinsics
//!
//! All Jacobians of matrix-valued functions are taken with respect to the column-major
//! flattening of the matrix.

use nalgebra::SMatrix;

pub mod aligned_box;
pub mod calibration;
pub mod constrained_dual_quadric;
pub mod dual_conic;
pub mod quadric_camera;

pub use aligned_box::{AlignedBox, AlignedBox2, AlignedBox3};
pub use calibration::Calibration;
pub use constrained_dual_quadric::ConstrainedDualQuadric;
pub use dual_conic::DualConic;
pub use quadric_camera::QuadricCamera;

/// ∂vec(Q*) / ∂quadric tangent
pub type Matrix16x9 = SMatrix<f64, 16, 9>;
/// ∂vec(C*) / ∂quadric tangent
pub type Matrix9 = SMatrix<f64, 9, 9>;
/// ∂vec(C*) / ∂camera pose tangent
pub type Matrix9x6 = SMatrix<f64, 9, 6>;
/// ∂box / ∂vec(C*), and ∂box / ∂quadric tangent
pub type Matrix4x9 = SMatrix<f64, 4, 9>;
