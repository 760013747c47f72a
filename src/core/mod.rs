//! Factor graph plumbing: keyed variable storage and parallel evaluation of factors.
//!
//! - [`values`]: typed key-to-variable snapshot
//! - [`residual_block`]: a factor bound to its variable keys
//! - [`graph`]: collection of residual blocks evaluated with rayon

pub mod graph;
pub mod residual_block;
pub mod values;

pub use graph::{FactorGraph, LinearizedFactor};
pub use values::{ValueType, Values, VariableEnum};
