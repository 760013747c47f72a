//! Ellipsoid landmarks for object-level SLAM.
//!
//! Objects are modelled as constrained dual quadrics (ellipsoids with a pose and three
//! radii). A quadric seen by a pinhole camera projects to a dual conic whose bounding box
//! can be compared with a 2D object detection. The resulting [`BoundingBoxFactor`]
//! supplies residuals and analytic Jacobians to a nonlinear least-squares optimizer.
//!
//! # Modules
//!
//! - [`manifold`]: SO(3) and SE(3) Lie groups and the [`manifold::Manifold`] trait
//! - [`geometry`]: quadrics, conics, boxes, calibration and projection
//! - [`factors`]: the bounding box factor
//! - [`core`]: keyed variable storage and a parallel factor graph evaluator

pub mod core;
pub mod error;
pub mod factors;
pub mod geometry;
pub mod logger;
pub mod manifold;
pub mod utils;

pub use self::core::{FactorGraph, Values, VariableEnum};
pub use error::{QuadricError, QuadricResult};
pub use factors::{BoundingBoxFactor, BoundingBoxFactorConfig, Factor};
pub use geometry::{
    AlignedBox2, AlignedBox3, Calibration, ConstrainedDualQuadric, DualConic, QuadricCamera,
};
pub use logger::{init_logger, init_logger_with_level};
