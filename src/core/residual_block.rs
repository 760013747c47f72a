use crate::core::values::Values;
use crate::error::{QuadricError, QuadricResult};
use crate::factors::Factor;
use nalgebra::{DMatrix, DVector};

/// A factor placed in the stacked residual, with the keys of the variables it connects.
pub struct ResidualBlock {
    pub residual_block_id: usize,
    pub residual_row_start_idx: usize,
    pub variable_key_list: Vec<String>,
    pub factor: Box<dyn Factor>,
}

impl ResidualBlock {
    pub fn new(
        residual_block_id: usize,
        residual_row_start_idx: usize,
        factor: Box<dyn Factor>,
    ) -> Self {
        ResidualBlock {
            residual_block_id,
            residual_row_start_idx,
            variable_key_list: factor.keys().into_iter().map(str::to_string).collect(),
            factor,
        }
    }

    pub fn dim_residual(&self) -> usize {
        self.factor.get_dimension()
    }

    /// Gather the parameter vectors of this block's variables, in key order.
    ///
    /// Returns the vectors together with their tangent sizes.
    ///
    /// # Errors
    /// [`QuadricError::MissingVariable`] for an unknown key and [`QuadricError::InvalidInput`]
    /// when a stored variable does not have the representation size the factor expects.
    pub fn parameters(&self, values: &Values) -> QuadricResult<(Vec<DVector<f64>>, Vec<usize>)> {
        let expected_sizes = self.factor.parameter_sizes();
        let mut param_vectors = Vec::with_capacity(self.variable_key_list.len());
        let mut var_sizes = Vec::with_capacity(self.variable_key_list.len());
        for (key, &expected) in self.variable_key_list.iter().zip(&expected_sizes) {
            let variable = values.get_variable(key)?;
            let vector = variable.to_vector();
            if vector.len() != expected {
                return Err(QuadricError::InvalidInput(format!(
                    "block {}: variable {} has {} parameters, factor expects {}",
                    self.residual_block_id,
                    key,
                    vector.len(),
                    expected
                )));
            }
            param_vectors.push(vector);
            var_sizes.push(variable.get_size());
        }
        Ok((param_vectors, var_sizes))
    }

    /// Residual and full Jacobian of the block at `values`.
    pub fn residual_and_jacobian(
        &self,
        values: &Values,
    ) -> QuadricResult<(DVector<f64>, DMatrix<f64>, Vec<usize>)> {
        let (params, sizes) = self.parameters(values)?;
        let (residual, jacobian) = self.factor.linearize(&params, true);
        let total: usize = sizes.iter().sum();
        let jacobian = jacobian.unwrap_or_else(|| DMatrix::zeros(residual.len(), total));
        Ok((residual, jacobian, sizes))
    }
}
