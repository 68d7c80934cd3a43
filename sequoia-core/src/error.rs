//! Error taxonomy for the solver core.
//!
//! Subproblem infeasibility and unboundedness are *not* errors: they are
//! `SubproblemStatus` values that the constraint-relaxation layer branches
//! on. `SolverError` is reserved for failures that abort the solve.

use thiserror::Error;

/// Errors that terminate a solve.
#[derive(Error, Debug)]
pub enum SolverError {
    /// NaN/Inf in intermediate data, factorization breakdown beyond the
    /// regularization cap, or a singular KKT system at the barrier floor.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// The model oracle failed to evaluate or returned non-finite data.
    #[error("model evaluation failed: {0}")]
    Oracle(String),

    /// An option could not be parsed or validated. Surfaced before the
    /// first iteration.
    #[error("invalid option `{key}`: {reason}")]
    InvalidOption {
        /// Offending option key.
        key: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl SolverError {
    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        SolverError::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
