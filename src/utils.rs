//! Small linear-algebra helpers shared by the manifolds, the projection code and the tests.
//!
//! Matrices are flattened column-major throughout, matching nalgebra's storage order, so a
//! 16x9 Jacobian of a 4x4 matrix has row `r + 4 * c` for entry `(r, c)`.

use crate::error::{QuadricError, QuadricResult};
use crate::manifold::{Manifold, ManifoldResult};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Vector3};

/// Skew-symmetric (cross product) matrix `[v]ₓ` such that `[v]ₓ w = v × w`.
pub fn skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Generator of se(3) for tangent coordinate `index` in `[ρ, θ]` order.
///
/// Indices 0..3 are translations (unit vector in the last column), 3..6 are rotations
/// (skew matrix of the unit axis in the top-left block).
///
/// # Panics
/// Panics if `index >= 6`.
pub fn se3_generator(index: usize) -> Matrix4<f64> {
    assert!(index < 6, "se(3) generator index {index} out of range");
    let mut generator = Matrix4::zeros();
    if index < 3 {
        generator[(index, 3)] = 1.0;
    } else {
        generator
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&skew_symmetric(&Vector3::ith(index - 3, 1.0)));
    }
    generator
}

/// Concatenate blocks left to right. All blocks must share the same row count.
pub fn hstack(blocks: &[DMatrix<f64>]) -> QuadricResult<DMatrix<f64>> {
    let rows = blocks.first().map_or(0, |b| b.nrows());
    if let Some(bad) = blocks.iter().find(|b| b.nrows() != rows) {
        return Err(QuadricError::InvalidInput(format!(
            "hstack row mismatch: {} vs {}",
            rows,
            bad.nrows()
        )));
    }
    let cols = blocks.iter().map(|b| b.ncols()).sum();
    let mut stacked = DMatrix::zeros(rows, cols);
    let mut col = 0;
    for block in blocks {
        stacked.columns_mut(col, block.ncols()).copy_from(block);
        col += block.ncols();
    }
    Ok(stacked)
}

/// Split a matrix into consecutive column blocks of the given widths.
pub fn split_columns(matrix: &DMatrix<f64>, widths: &[usize]) -> QuadricResult<Vec<DMatrix<f64>>> {
    let total: usize = widths.iter().sum();
    if total != matrix.ncols() {
        return Err(QuadricError::InvalidInput(format!(
            "column widths sum to {} but matrix has {} columns",
            total,
            matrix.ncols()
        )));
    }
    let mut col = 0;
    Ok(widths
        .iter()
        .map(|&width| {
            let block = matrix.columns(col, width).into_owned();
            col += width;
            block
        })
        .collect())
}

/// Central-difference Jacobian of a Euclidean function.
pub fn numerical_jacobian<F>(f: F, x: &DVector<f64>, step: f64) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let f0 = f(x);
    let mut jacobian = DMatrix::zeros(f0.len(), x.len());
    for i in 0..x.len() {
        let mut plus = x.clone();
        let mut minus = x.clone();
        plus[i] += step;
        minus[i] -= step;
        let column = (f(&plus) - f(&minus)) / (2.0 * step);
        jacobian.set_column(i, &column);
    }
    jacobian
}

/// Central-difference Jacobian of `f` with respect to right perturbations of `x`,
/// taken through [`Manifold::retract`].
pub fn numerical_jacobian_manifold<M, F>(f: F, x: &M, step: f64) -> ManifoldResult<DMatrix<f64>>
where
    M: Manifold,
    F: Fn(&M) -> DVector<f64>,
{
    let f0 = f(x);
    let mut jacobian = DMatrix::zeros(f0.len(), M::DOF);
    for i in 0..M::DOF {
        let mut delta = DVector::zeros(M::DOF);
        delta[i] = step;
        let plus = f(&x.retract(&delta)?);
        delta[i] = -step;
        let minus = f(&x.retract(&delta)?);
        jacobian.set_column(i, &((plus - minus) / (2.0 * step)));
    }
    Ok(jacobian)
}
