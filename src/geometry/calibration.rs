//! Pinhole calibration consumed by the projection.

use crate::error::{QuadricError, QuadricResult};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics with optional skew.
///
/// # Parameters
///
/// - `fx`, `fy`: Focal lengths in pixels
/// - `skew`: Axis skew (0 for most cameras)
/// - `cx`, `cy`: Principal point coordinates in pixels
///
/// # Calibration Matrix
///
/// ```text
///     | fx  s   cx |
/// K = | 0   fy  cy |
///     | 0   0   1  |
/// ```
///
/// # Example
///
/// ```
/// use apex_quadric::geometry::Calibration;
///
/// let calibration = Calibration::new(500.0, 500.0, 320.0, 240.0);
/// assert_eq!(calibration.k()[(0, 2)], 320.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Skew between the image axes
    #[serde(default)]
    pub skew: f64,
    /// Principal point x coordinate (pixels)
    pub cx: f64,
    /// Principal point y coordinate (pixels)
    pub cy: f64,
}

impl Calibration {
    /// Create a calibration without skew.
    #[must_use]
    pub const fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            skew: 0.0,
            cx,
            cy,
        }
    }

    /// Create a calibration from `[fx, fy, skew, cx, cy]`.
    pub fn from_params(params: &[f64]) -> QuadricResult<Self> {
        let &[fx, fy, skew, cx, cy] = params else {
            return Err(QuadricError::InvalidInput(format!(
                "calibration expects 5 parameters [fx, fy, skew, cx, cy], got {}",
                params.len()
            )));
        };
        let calibration = Self {
            fx,
            fy,
            skew,
            cx,
            cy,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// Builder-style skew setter.
    #[must_use]
    pub const fn with_skew(mut self, skew: f64) -> Self {
        self.skew = skew;
        self
    }

    /// Check that the intrinsics describe a usable camera.
    pub fn validate(&self) -> QuadricResult<()> {
        let values = [self.fx, self.fy, self.skew, self.cx, self.cy];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(QuadricError::InvalidInput(format!(
                "calibration contains non-finite values: {values:?}"
            )));
        }
        if self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(QuadricError::InvalidInput(format!(
                "focal lengths must be positive, got fx={} fy={}",
                self.fx, self.fy
            )));
        }
        Ok(())
    }

    /// `[fx, fy, skew, cx, cy]`.
    pub fn params(&self) -> [f64; 5] {
        [self.fx, self.fy, self.skew, self.cx, self.cy]
    }

    /// The 3x3 calibration matrix K.
    pub fn k(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}
