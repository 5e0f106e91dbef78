//! Grid Diffusion - load-balancing coefficients for periodic 3D grids
//!
//! For a fully periodic cubic grid, every cell exchanges load with its 26
//! Moore neighbours. The convergence of first- and second-order diffusion
//! schemes on such a grid is governed by two eigenvalues of the diffusion
//! matrix, from which the coefficients α, β and γ follow
//! (Muthukrishnan et al., 1998).
//!
//! The pipeline per grid size lives in [`spectral`]; [`sweep`] runs it over
//! a range of sizes on a rayon pool, [`output`] persists the table and
//! [`plot`] renders it.

pub mod error;
pub mod output;
pub mod plot;
pub mod spectral;
pub mod sweep;

pub use error::{DiffusionError, DiffusionResult, SolverError};
pub use spectral::{
    DenseSolver, DiffusionParams, EigenPair, EigenSolver, GridSize, LanczosSolver, SolverConfig,
};
pub use sweep::{run_sweep, FailurePolicy, GridRange, SweepConfig, SweepReport, SweepRow};
