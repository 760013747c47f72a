//! Factor graph container used to evaluate many bounding box observations at once.
//!
//! The graph owns residual blocks and evaluates them in parallel with rayon. It does not
//! solve: the stacked residual and Jacobian are handed to whichever least-squares solver
//! the caller uses.

use crate::core::residual_block::ResidualBlock;
use crate::core::values::Values;
use crate::error::{QuadricError, QuadricResult};
use crate::factors::Factor;
use crate::utils::split_columns;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Residual of one block with its Jacobian split per variable key.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearizedFactor {
    pub residual: DVector<f64>,
    pub jacobians: Vec<(String, DMatrix<f64>)>,
}

/// Collection of residual blocks over keyed variables.
#[derive(Default)]
pub struct FactorGraph {
    residual_blocks: Vec<ResidualBlock>,
    total_residual_dimension: usize,
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factor over the variables named by its [`Factor::keys`]. Returns the block id.
    pub fn add_factor(&mut self, factor: Box<dyn Factor>) -> usize {
        let id = self.residual_blocks.len();
        let block = ResidualBlock::new(id, self.total_residual_dimension, factor);
        self.total_residual_dimension += block.dim_residual();
        self.residual_blocks.push(block);
        id
    }

    pub fn len(&self) -> usize {
        self.residual_blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residual_blocks.is_empty()
    }

    pub fn residual_dimension(&self) -> usize {
        self.total_residual_dimension
    }

    pub fn residual_blocks(&self) -> &[ResidualBlock] {
        &self.residual_blocks
    }

    /// Linearize every block at `values`.
    ///
    /// # Errors
    /// [`QuadricError::MissingVariable`] if a block references an unknown key, and
    /// [`QuadricError::InvalidInput`] if a key holds a variable of the wrong kind.
    pub fn linearize(&self, values: &Values) -> QuadricResult<Vec<LinearizedFactor>> {
        self.residual_blocks
            .par_iter()
            .map(|block| -> QuadricResult<LinearizedFactor> {
                let (residual, jacobian, sizes) = block.residual_and_jacobian(values)?;
                let blocks = split_columns(&jacobian, &sizes)?;
                Ok(LinearizedFactor {
                    residual,
                    jacobians: block.variable_key_list.iter().cloned().zip(blocks).collect(),
                })
            })
            .collect()
    }

    /// Stacked residual and dense Jacobian. Variable columns follow the sorted key order of
    /// `values`; the returned map gives the first column of each key.
    pub fn linearize_dense(
        &self,
        values: &Values,
    ) -> QuadricResult<(DVector<f64>, DMatrix<f64>, HashMap<String, usize>)> {
        let mut col_idx = HashMap::new();
        let mut total_dof = 0;
        for key in values.keys() {
            col_idx.insert(key.to_string(), total_dof);
            total_dof += values.get_variable(key)?.get_size();
        }

        let linearized = self.linearize(values)?;
        let mut residual = DVector::zeros(self.total_residual_dimension);
        let mut jacobian = DMatrix::zeros(self.total_residual_dimension, total_dof);
        for (block, factor) in self.residual_blocks.iter().zip(&linearized) {
            let row = block.residual_row_start_idx;
            residual
                .rows_mut(row, factor.residual.len())
                .copy_from(&factor.residual);
            for (key, jac) in &factor.jacobians {
                let col = *col_idx
                    .get(key)
                    .ok_or_else(|| QuadricError::MissingVariable { key: key.clone() })?;
                jacobian
                    .view_mut((row, col), (jac.nrows(), jac.ncols()))
                    .copy_from(jac);
            }
        }
        debug!(
            "linearized {} blocks: {} residuals x {} tangent dims",
            self.residual_blocks.len(),
            self.total_residual_dimension,
            total_dof
        );
        Ok((residual, jacobian, col_idx))
    }

    /// `0.5 * Σ ‖r_i‖²` over all blocks.
    pub fn total_error(&self, values: &Values) -> QuadricResult<f64> {
        let errors = self
            .residual_blocks
            .par_iter()
            .map(|block| -> QuadricResult<f64> {
                let (params, _) = block.parameters(values)?;
                let (residual, _) = block.factor.linearize(&params, false);
                Ok(residual.norm_squared())
            })
            .collect::<QuadricResult<Vec<f64>>>()?;
        Ok(0.5 * errors.iter().sum::<f64>())
    }
}
