//! Error types for matrix assembly, eigensolving and sweeps.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::spectral::grid::GridSize;

/// Failures reported by an [`EigenSolver`](crate::spectral::EigenSolver) back end.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The Krylov iteration hit its iteration cap before the requested
    /// Ritz values settled.
    #[error("eigensolver did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    /// The per-unit deadline passed while iterating.
    #[error("eigensolver timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// More eigenvalues were requested than the matrix has.
    #[error("requested {requested} eigenvalues from a {dim}x{dim} matrix")]
    TooFewEigenvalues { requested: usize, dim: usize },
}

/// Root error type for the crate.
#[derive(Error, Debug)]
pub enum DiffusionError {
    /// Range step must be at least 1.
    #[error("invalid range step {0}: must be >= 1")]
    InvalidStep(usize),

    /// Worker pool needs at least one thread.
    #[error("invalid worker count {0}: must be >= 1")]
    InvalidWorkers(usize),

    /// Grid too small for the 27-cell periodic neighbourhood to be distinct.
    #[error("grid size {grid_size} is below the minimum of {min} cells per axis")]
    Precondition { grid_size: GridSize, min: usize },

    /// The same (row, col) pair was pushed twice during assembly.
    #[error("duplicate matrix entry at ({row}, {col})")]
    DuplicateEntry { row: usize, col: usize },

    #[error("grid size {grid_size}: eigensolver failed")]
    Convergence {
        grid_size: GridSize,
        #[source]
        source: SolverError,
    },

    /// λ₂ or λₙ is not strictly positive (or not finite).
    #[error("invalid eigenvalues: lambda_2 = {lambda_2}, lambda_n = {lambda_n}")]
    InvalidEigenvalue { lambda_2: f64, lambda_n: f64 },

    /// γ ≥ 1 makes the β square root argument negative.
    #[error("invalid gamma {gamma}: must be < 1")]
    InvalidGamma { gamma: f64 },

    /// A domain error raised inside one grid size's unit of work.
    #[error("grid size {grid_size}")]
    Unit {
        grid_size: GridSize,
        #[source]
        source: Box<DiffusionError>,
    },

    #[error("thread pool error: {0}")]
    ThreadPool(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error on line {line}: {msg}")]
    Parse { line: usize, msg: String },
}

impl DiffusionError {
    /// Grid size this error is attributed to, if any.
    pub fn grid_size(&self) -> Option<GridSize> {
        match self {
            Self::Precondition { grid_size, .. }
            | Self::Convergence { grid_size, .. }
            | Self::Unit { grid_size, .. } => Some(*grid_size),
            _ => None,
        }
    }

    /// This error and its sources, `: `-separated.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }

    /// Attach a grid size to an error raised inside a unit of work.
    /// Errors that already carry one are returned unchanged.
    pub fn in_unit(self, grid_size: GridSize) -> Self {
        if self.grid_size().is_some() {
            self
        } else {
            Self::Unit {
                grid_size,
                source: Box::new(self),
            }
        }
    }
}

pub type DiffusionResult<T> = Result<T, DiffusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_unit_wraps_domain_errors() {
        let err = DiffusionError::InvalidGamma { gamma: 1.5 }.in_unit(GridSize::cubic(7));
        assert_eq!(err.grid_size(), Some(GridSize::cubic(7)));
        assert_eq!(err.to_string(), "grid size 7x7x7");
        assert_eq!(err.chain(), "grid size 7x7x7: invalid gamma 1.5: must be < 1");
    }

    #[test]
    fn test_chain_names_each_cause_once() {
        let err = DiffusionError::Convergence {
            grid_size: GridSize::cubic(4),
            source: SolverError::NoConvergence { iterations: 2 },
        };
        let cause = "eigensolver did not converge after 2 iterations";
        assert!(!err.to_string().contains(cause));
        assert_eq!(err.chain().matches(cause).count(), 1);
        assert_eq!(
            format!("{:#}", anyhow::Error::from(err)),
            format!("grid size 4x4x4: eigensolver failed: {cause}")
        );
    }

    #[test]
    fn test_in_unit_keeps_existing_grid_size() {
        let err = DiffusionError::Convergence {
            grid_size: GridSize::cubic(4),
            source: SolverError::NoConvergence { iterations: 10 },
        }
        .in_unit(GridSize::cubic(9));
        assert_eq!(err.grid_size(), Some(GridSize::cubic(4)));
    }
}
