//! Axis-aligned boxes in image space (2D) and world space (3D).
//!
//! Both are the same [`AlignedBox`] value type over a const dimension. Boxes are closed:
//! points on the boundary are contained, and boxes that only touch still intersect.

use crate::error::{QuadricError, QuadricResult};
use nalgebra::{SVector, Vector2, Vector3, Vector4, Vector6};
use std::fmt;

/// Axis-aligned box with componentwise `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignedBox<const D: usize> {
    min: SVector<f64, D>,
    max: SVector<f64, D>,
}

/// Image-space box, usually in pixels.
pub type AlignedBox2 = AlignedBox<2>;

/// World-space box.
pub type AlignedBox3 = AlignedBox<3>;

impl<const D: usize> AlignedBox<D> {
    /// Create a box from its min and max corners.
    ///
    /// Fails with [`QuadricError::InvalidInput`] if any coordinate is not finite or
    /// `min > max` along some axis.
    pub fn from_corners(min: SVector<f64, D>, max: SVector<f64, D>) -> QuadricResult<Self> {
        if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
            return Err(QuadricError::InvalidInput(format!(
                "box corners must be finite, got min {:?} max {:?}",
                min.as_slice(),
                max.as_slice()
            )));
        }
        if let Some(axis) = (0..D).find(|&i| min[i] > max[i]) {
            return Err(QuadricError::InvalidInput(format!(
                "box min exceeds max along axis {}: {} > {}",
                axis, min[axis], max[axis]
            )));
        }
        Ok(Self { min, max })
    }

    /// Smallest box containing every point. `None` for an empty slice.
    pub fn from_points(points: &[SVector<f64, D>]) -> Option<Self> {
        let first = points.first()?;
        let (min, max) = points.iter().skip(1).fold((*first, *first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        });
        Some(Self { min, max })
    }

    /// Box spanning `center ± half_extent`. `half_extent` must be non-negative.
    pub(crate) fn from_center_half_extent(
        center: SVector<f64, D>,
        half_extent: SVector<f64, D>,
    ) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    pub fn min(&self) -> SVector<f64, D> {
        self.min
    }

    pub fn max(&self) -> SVector<f64, D> {
        self.max
    }

    /// Side lengths along each axis.
    pub fn dimensions(&self) -> SVector<f64, D> {
        self.max - self.min
    }

    pub fn center(&self) -> SVector<f64, D> {
        (self.min + self.max) * 0.5
    }

    /// Area (2D) or volume (3D).
    pub fn measure(&self) -> f64 {
        self.dimensions().iter().product()
    }

    /// Whether `point` lies inside or on the boundary.
    pub fn contains_point(&self, point: &SVector<f64, D>) -> bool {
        (0..D).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// Whether `other` lies entirely within this box.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Whether the two boxes overlap or touch.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..D).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Overlapping region, `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        })
    }

    /// Intersection over union. Zero for disjoint or zero-measure boxes.
    pub fn iou(&self, other: &Self) -> f64 {
        let Some(overlap) = self.intersection(other) else {
            return 0.0;
        };
        let inter = overlap.measure();
        let union = self.measure() + other.measure() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// All 2^D corners. Bit `i` of the corner index selects max along axis `i`.
    pub fn corners(&self) -> Vec<SVector<f64, D>> {
        (0..1usize << D)
            .map(|mask| {
                SVector::<f64, D>::from_fn(|i, _| {
                    if mask & (1 << i) == 0 {
                        self.min[i]
                    } else {
                        self.max[i]
                    }
                })
            })
            .collect()
    }

    /// Componentwise comparison of both corners within `tolerance`.
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        (self.min - other.min).amax() <= tolerance && (self.max - other.max).amax() <= tolerance
    }
}

impl AlignedBox2 {
    /// Create an image box from `(xmin, ymin, xmax, ymax)`.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> QuadricResult<Self> {
        Self::from_corners(Vector2::new(xmin, ymin), Vector2::new(xmax, ymax))
    }

    /// Create from a `(xmin, ymin, xmax, ymax)` vector.
    pub fn from_vector(vector: &Vector4<f64>) -> QuadricResult<Self> {
        Self::new(vector[0], vector[1], vector[2], vector[3])
    }

    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    pub fn xmax(&self) -> f64 {
        self.max.x
    }

    pub fn ymax(&self) -> f64 {
        self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.measure()
    }

    /// `(xmin, ymin, xmax, ymax)`, the layout used for residuals.
    pub fn vector(&self) -> Vector4<f64> {
        Vector4::new(self.min.x, self.min.y, self.max.x, self.max.y)
    }
}

impl AlignedBox3 {
    /// Create a world box from min and max coordinates.
    pub fn new(
        xmin: f64,
        ymin: f64,
        zmin: f64,
        xmax: f64,
        ymax: f64,
        zmax: f64,
    ) -> QuadricResult<Self> {
        Self::from_corners(Vector3::new(xmin, ymin, zmin), Vector3::new(xmax, ymax, zmax))
    }

    pub fn volume(&self) -> f64 {
        self.measure()
    }

    /// `(xmin, ymin, zmin, xmax, ymax, zmax)`.
    pub fn vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        )
    }
}

impl fmt::Display for AlignedBox2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlignedBox2(xmin: {:.4}, ymin: {:.4}, xmax: {:.4}, ymax: {:.4})",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

impl fmt::Display for AlignedBox3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlignedBox3(min: [{:.4}, {:.4}, {:.4}], max: [{:.4}, {:.4}, {:.4}])",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
