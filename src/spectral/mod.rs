//! Spectral analysis of diffusion on periodic grids.
//!
//! This module contains the per-grid-size pipeline: topology, sparse matrix
//! assembly, extreme eigenvalues and the derived coefficients.
//! The sweep in `sweep.rs` calls these functions once per grid size.

pub mod grid;
pub mod matrix;
pub mod params;
pub mod solver;

pub use grid::{cells, linearize, neighbors, CellIndex, GridSize, MIN_GRID_SIZE};
pub use matrix::{build_adjacency, CsrMatrix, TripletList};
pub use params::{derive_params, DiffusionParams};
pub use solver::{
    extreme_eigenvalues, DenseSolver, EigenPair, EigenSolver, LanczosSolver, SolverConfig, Which,
};
