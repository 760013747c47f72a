//! Typed key-to-value store for factor graph variables.
//!
//! [`Values`] is the snapshot an optimizer hands to factors each iteration. It holds
//! camera poses ([`SE3`]) and quadrics ([`ConstrainedDualQuadric`]) under string keys and
//! never exposes how they are stored: callers read through the typed [`Values::get`] and
//! update through [`Values::retract`].

use crate::error::{QuadricError, QuadricResult};
use crate::geometry::ConstrainedDualQuadric;
use crate::manifold::Manifold;
use crate::manifold::se3::SE3;
use nalgebra::DVector;
use std::collections::HashMap;

/// The variable types a factor graph over quadrics can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableEnum {
    /// Camera pose, camera-to-world
    Pose(SE3),
    /// Ellipsoid landmark
    Quadric(ConstrainedDualQuadric),
}

impl VariableEnum {
    /// Tangent space dimension.
    pub fn get_size(&self) -> usize {
        match self {
            VariableEnum::Pose(_) => <SE3 as Manifold>::DOF,
            VariableEnum::Quadric(_) => <ConstrainedDualQuadric as Manifold>::DOF,
        }
    }

    /// Representation vector handed to [`crate::factors::Factor::linearize`].
    pub fn to_vector(&self) -> DVector<f64> {
        match self {
            VariableEnum::Pose(pose) => pose.clone().into(),
            VariableEnum::Quadric(quadric) => quadric.clone().into(),
        }
    }

    /// Apply a tangent space update.
    pub fn retract(&self, delta: &DVector<f64>) -> QuadricResult<VariableEnum> {
        Ok(match self {
            VariableEnum::Pose(pose) => VariableEnum::Pose(pose.retract(delta)?),
            VariableEnum::Quadric(quadric) => VariableEnum::Quadric(quadric.retract(delta)?),
        })
    }

    fn type_name(&self) -> &'static str {
        match self {
            VariableEnum::Pose(_) => SE3::TYPE_NAME,
            VariableEnum::Quadric(_) => ConstrainedDualQuadric::TYPE_NAME,
        }
    }
}

/// Types that can be stored in and read back from [`Values`].
pub trait ValueType: Into<VariableEnum> + Sized {
    const TYPE_NAME: &'static str;

    fn from_variable(variable: &VariableEnum) -> Option<&Self>;
}

impl ValueType for SE3 {
    const TYPE_NAME: &'static str = "SE3";

    fn from_variable(variable: &VariableEnum) -> Option<&Self> {
        match variable {
            VariableEnum::Pose(pose) => Some(pose),
            _ => None,
        }
    }
}

impl ValueType for ConstrainedDualQuadric {
    const TYPE_NAME: &'static str = "ConstrainedDualQuadric";

    fn from_variable(variable: &VariableEnum) -> Option<&Self> {
        match variable {
            VariableEnum::Quadric(quadric) => Some(quadric),
            _ => None,
        }
    }
}

impl From<SE3> for VariableEnum {
    fn from(pose: SE3) -> Self {
        VariableEnum::Pose(pose)
    }
}

impl From<ConstrainedDualQuadric> for VariableEnum {
    fn from(quadric: ConstrainedDualQuadric) -> Self {
        VariableEnum::Quadric(quadric)
    }
}

/// Key-to-variable snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    variables: HashMap<String, VariableEnum>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous entry if any.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<VariableEnum>,
    ) -> Option<VariableEnum> {
        self.variables.insert(key.into(), value.into())
    }

    /// Typed read access.
    ///
    /// # Errors
    /// [`QuadricError::MissingVariable`] if nothing is stored under `key`,
    /// [`QuadricError::TypeMismatch`] if the stored variable is not a `T`.
    pub fn get<T: ValueType>(&self, key: &str) -> QuadricResult<&T> {
        let variable = self.get_variable(key)?;
        T::from_variable(variable).ok_or_else(|| QuadricError::TypeMismatch {
            key: key.to_string(),
            expected: T::TYPE_NAME,
            found: variable.type_name(),
        })
    }

    /// Untyped read access.
    pub fn get_variable(&self, key: &str) -> QuadricResult<&VariableEnum> {
        self.variables
            .get(key)
            .ok_or_else(|| QuadricError::MissingVariable {
                key: key.to_string(),
            })
    }

    pub fn remove(&mut self, key: &str) -> Option<VariableEnum> {
        self.variables.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Sum of the tangent dimensions of all variables.
    pub fn tangent_dim(&self) -> usize {
        self.variables.values().map(VariableEnum::get_size).sum()
    }

    /// New snapshot with each keyed tangent update applied. Keys without an update are
    /// copied unchanged.
    ///
    /// # Errors
    /// [`QuadricError::MissingVariable`] for an update whose key is not stored, or a
    /// manifold error for a wrongly sized update.
    pub fn retract(&self, deltas: &HashMap<String, DVector<f64>>) -> QuadricResult<Values> {
        if let Some(key) = deltas.keys().find(|k| !self.variables.contains_key(*k)) {
            return Err(QuadricError::MissingVariable { key: key.clone() });
        }
        let variables = self
            .variables
            .iter()
            .map(|(key, variable)| -> QuadricResult<(String, VariableEnum)> {
                let updated = match deltas.get(key) {
                    Some(delta) => variable.retract(delta)?,
                    None => variable.clone(),
                };
                Ok((key.clone(), updated))
            })
            .collect::<QuadricResult<HashMap<_, _>>>()?;
        Ok(Values { variables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::LieGroup;
    use nalgebra::Vector3;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample_values() -> QuadricResult<Values> {
        let mut values = Values::new();
        values.insert("x0", SE3::from_translation_euler(0.0, 0.0, -3.0, 0.0, 0.0, 0.0));
        values.insert(
            "q0",
            ConstrainedDualQuadric::new(SE3::identity(), Vector3::new(1.0, 2.0, 3.0))?,
        );
        Ok(values)
    }

    #[test]
    fn test_typed_access() -> TestResult {
        let values = sample_values()?;
        assert_eq!(values.len(), 2);
        assert_eq!(values.keys(), vec!["q0", "x0"]);
        assert_eq!(values.get::<SE3>("x0")?.translation().z, -3.0);
        assert_eq!(
            values.get::<ConstrainedDualQuadric>("q0")?.radii(),
            Vector3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(values.tangent_dim(), 15);
        Ok(())
    }

    #[test]
    fn test_missing_and_mismatched_keys() -> TestResult {
        let values = sample_values()?;
        assert_eq!(
            values.get::<SE3>("x9"),
            Err(QuadricError::MissingVariable {
                key: "x9".to_string()
            })
        );
        assert_eq!(
            values.get::<SE3>("q0"),
            Err(QuadricError::TypeMismatch {
                key: "q0".to_string(),
                expected: "SE3",
                found: "ConstrainedDualQuadric",
            })
        );
        Ok(())
    }

    #[test]
    fn test_retract_updates_only_keyed_variables() -> TestResult {
        let values = sample_values()?;
        let mut deltas = HashMap::new();
        deltas.insert(
            "q0".to_string(),
            DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0_f64.ln()]),
        );
        let updated = values.retract(&deltas)?;
        let quadric = updated.get::<ConstrainedDualQuadric>("q0")?;
        assert!((quadric.centroid() - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((quadric.radii().z - 6.0).abs() < 1e-12);
        assert_eq!(updated.get::<SE3>("x0")?, values.get::<SE3>("x0")?);

        deltas.insert("x7".to_string(), DVector::zeros(6));
        assert!(values.retract(&deltas).is_err());
        Ok(())
    }

    #[test]
    fn test_retract_rejects_wrong_dimension() -> TestResult {
        let values = sample_values()?;
        let mut deltas = HashMap::new();
        deltas.insert("x0".to_string(), DVector::zeros(9));
        assert!(matches!(
            values.retract(&deltas),
            Err(QuadricError::Manifold(_))
        ));
        Ok(())
    }
}
