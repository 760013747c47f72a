//! Dual conics: the image-space silhouettes of projected dual quadrics.
//!
//! A dual conic C* is a symmetric 3x3 matrix whose tangent lines `l` satisfy
//! `lᵀ C* l = 0`. The vertical tangents `x = u` (lines `(1, 0, -u)`) therefore solve
//! ```text
//! C₂₂ u² - 2 C₀₂ u + C₀₀ = 0   =>   u = (C₀₂ ± sqrt(C₀₂² - C₀₀ C₂₂)) / C₂₂
//! ```
//! and the horizontal tangents follow with C₁₁, C₁₂ in place of C₀₀, C₀₂. These four
//! tangents are exactly the smallest axis-aligned box around the ellipse.

use crate::error::{QuadricError, QuadricResult};
use crate::geometry::{AlignedBox2, Matrix4x9};
use nalgebra::Matrix3;
use std::fmt;

/// Singular value ratio below which a conditioned conic is treated as rank deficient.
const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Projected dual conic. Only produced by [`crate::geometry::QuadricCamera::project`].
#[derive(Clone, Debug, PartialEq)]
pub struct DualConic {
    matrix: Matrix3<f64>,
}

/// Tangent-line roots along one image axis, with their derivatives with respect to
/// `(C_aa, C_a2, C₂₂)`.
struct AxisRoots {
    min: f64,
    max: f64,
    d_min: [f64; 3],
    d_max: [f64; 3],
}

impl DualConic {
    pub(crate) fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        self.matrix
    }

    /// Conic scaled so that C₂₂ = 1. Returned unchanged when C₂₂ is zero.
    pub fn normalize(&self) -> Self {
        let c22 = self.matrix[(2, 2)];
        if c22 == 0.0 {
            return self.clone();
        }
        Self::from_matrix(self.matrix / c22)
    }

    /// Whether the conic is rank deficient (a point, line pair or worse).
    ///
    /// The rank test runs on the [`conditioned`](Self::conditioned) conic, so it depends
    /// on the shape of the conic and not on where it sits in the image or how large it is.
    pub fn is_degenerate(&self) -> bool {
        let Some(conditioned) = self.conditioned() else {
            return true;
        };
        let singular_values = conditioned.singular_values();
        let largest = singular_values.max();
        largest == 0.0 || singular_values.min() <= DEGENERACY_TOLERANCE * largest
    }

    /// Whether the conic is a real, non-degenerate ellipse.
    ///
    /// The primal conic `C = (C*)⁻¹` is an ellipse when its upper-left 2x2 block has a
    /// positive determinant, and is real (non-empty) when `C₀₀ · det(C) < 0`. Both signs
    /// are unchanged by the conditioning transform.
    pub fn is_ellipse(&self) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let Some(primal) = self.conditioned().and_then(|c| c.try_inverse()) else {
            return false;
        };
        let block_det = primal[(0, 0)] * primal[(1, 1)] - primal[(0, 1)] * primal[(1, 0)];
        block_det > 0.0 && primal[(0, 0)] * primal.determinant() < 0.0
    }

    /// Conic moved to the origin and scaled to unit extent: `S T C* Tᵀ Sᵀ / |C₂₂|` with
    /// `T` translating the centre `(C₀₂, C₁₂) / C₂₂` to the origin and `S = diag(1/s, 1/s, 1)`
    /// with `s² = (|C'₀₀| + |C'₁₁|) / |C₂₂|`.
    ///
    /// `None` when an entry is not finite or the conic has no finite centre or extent.
    fn conditioned(&self) -> Option<Matrix3<f64>> {
        let c = &self.matrix;
        if c.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let c22 = c[(2, 2)];
        if c22 == 0.0 {
            return None;
        }
        let (u, v) = (c[(0, 2)] / c22, c[(1, 2)] / c22);
        let translate = Matrix3::new(1.0, 0.0, -u, 0.0, 1.0, -v, 0.0, 0.0, 1.0);
        let centred = translate * c * translate.transpose();

        let extent = (centred[(0, 0)].abs() + centred[(1, 1)].abs()) / c22.abs();
        if !(extent.is_finite() && extent > 0.0) {
            return None;
        }
        let inv_scale = extent.sqrt().recip();
        let scale = Matrix3::new(inv_scale, 0.0, 0.0, 0.0, inv_scale, 0.0, 0.0, 0.0, 1.0);
        let conditioned = scale * centred * scale / c22.abs();
        conditioned
            .iter()
            .all(|v| v.is_finite())
            .then_some(conditioned)
    }

    /// Smallest axis-aligned box containing the ellipse.
    ///
    /// If `jacobian` is provided it receives ∂(xmin, ymin, xmax, ymax) / ∂vec(C*), where the
    /// box reads the upper triangle of the column-major flattened conic (entries 0, 4, 6, 7
    /// and 8).
    ///
    /// # Errors
    /// [`QuadricError::DegenerateConic`] if the conic is not a real ellipse or has no
    /// finite tangent lines along an axis.
    pub fn bounds(&self, jacobian: Option<&mut Matrix4x9>) -> QuadricResult<AlignedBox2> {
        if !self.is_ellipse() {
            return Err(QuadricError::DegenerateConic(format!(
                "conic is not a real ellipse: {:?}",
                self.matrix.as_slice()
            )));
        }
        let c = &self.matrix;
        let x = axis_roots(c[(0, 0)], c[(0, 2)], c[(2, 2)], "x")?;
        let y = axis_roots(c[(1, 1)], c[(1, 2)], c[(2, 2)], "y")?;

        if let Some(jac) = jacobian {
            jac.fill(0.0);
            // Column-major indices of C00, C02, C22 and C11, C12, C22.
            const X_ENTRIES: [usize; 3] = [0, 6, 8];
            const Y_ENTRIES: [usize; 3] = [4, 7, 8];
            for i in 0..3 {
                jac[(0, X_ENTRIES[i])] = x.d_min[i];
                jac[(1, Y_ENTRIES[i])] = y.d_min[i];
                jac[(2, X_ENTRIES[i])] = x.d_max[i];
                jac[(3, Y_ENTRIES[i])] = y.d_max[i];
            }
        }

        AlignedBox2::new(x.min, y.min, x.max, y.max)
    }
}

/// Roots `u± = (b ± s) / c`, `s = sqrt(b² - a c)`, with derivatives
/// ```text
/// ∂u±/∂a = ∓1 / (2s)
/// ∂u±/∂b = (1 ± b/s) / c
/// ∂u±/∂c = ∓a / (2sc) - (b ± s) / c²
/// ```
fn axis_roots(a: f64, b: f64, c: f64, axis: &str) -> QuadricResult<AxisRoots> {
    let discriminant = b * b - a * c;
    if discriminant <= 0.0 || c.abs() <= f64::EPSILON * (a.abs() + b.abs()) {
        return Err(QuadricError::DegenerateConic(format!(
            "no pair of {axis} tangents (discriminant {discriminant:.3e}, C22 {c:.3e})"
        )));
    }
    let s = discriminant.sqrt();
    let plus = (b + s) / c;
    let minus = (b - s) / c;
    let d_plus = [
        -1.0 / (2.0 * s),
        (1.0 + b / s) / c,
        -a / (2.0 * s * c) - (b + s) / (c * c),
    ];
    let d_minus = [
        1.0 / (2.0 * s),
        (1.0 - b / s) / c,
        a / (2.0 * s * c) - (b - s) / (c * c),
    ];
    // s > 0, so the ordering of the roots follows the sign of c.
    Ok(if c > 0.0 {
        AxisRoots {
            min: minus,
            max: plus,
            d_min: d_minus,
            d_max: d_plus,
        }
    } else {
        AxisRoots {
            min: plus,
            max: minus,
            d_min: d_plus,
            d_max: d_minus,
        }
    })
}

impl fmt::Display for DualConic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.matrix;
        write!(
            f,
            "DualConic([[{:.4}, {:.4}, {:.4}], [{:.4}, {:.4}, {:.4}], [{:.4}, {:.4}, {:.4}]])",
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)]
        )
    }
}
