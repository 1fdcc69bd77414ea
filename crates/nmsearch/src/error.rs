//! Errors that escape a search call.
//!
//! Generation, degeneracy, budget and evaluator failures never show up here:
//! the step engine resolves them into a `StopReason`. What remains is invalid
//! configuration (rejected before the first step) and stale point handles.

use thiserror::Error;

use crate::point::StoreError;

/// Configuration rejected before the `INITIAL` step runs.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("no free variables")]
    NoFreeVariables,
    #[error("{what} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("lower bound exceeds upper bound at index {index}")]
    InvalidBounds { index: usize },
    #[error("mesh size at free index {index} must be positive and finite")]
    InvalidMeshSize { index: usize },
    #[error("parameter {name} = {value} is out of range")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("incumbent is not a successfully evaluated point")]
    UndefinedIncumbent,
}

/// Failure of a whole `run_search` call.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SearchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
