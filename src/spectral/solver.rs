//! Extreme eigenvalues of the diffusion matrix.
//!
//! The numerical back end sits behind [`EigenSolver`]. [`LanczosSolver`] is
//! the sparse default; [`DenseSolver`] diagonalises the full matrix and is
//! only practical for small grids.
//!
//! Lanczos notes:
//! - Full re-orthogonalisation (two Gram-Schmidt passes) keeps the basis
//!   orthonormal, so no spurious Ritz copies appear
//! - The start vector comes from a seeded RNG; a unit gives the same result
//!   on whichever worker runs it
//! - On breakdown (invariant subspace found) the iteration continues from a
//!   fresh random vector orthogonal to the basis
//! - Ritz values come from the projected matrix via nalgebra
//! - With [`SolverConfig::max_basis`] set, a full basis is thick-restarted
//!   from the best Ritz vectors, which bounds memory at `max_basis` vectors

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::matrix::CsrMatrix;
use crate::error::SolverError;

/// Which end of the spectrum to return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Which {
    /// Ascending by `|λ|`.
    SmallestMagnitude,
    /// Descending by `|λ|`.
    LargestMagnitude,
}

/// A back end able to return `k` extreme eigenvalues of a symmetric matrix.
///
/// Krylov back ends do not resolve multiplicities: a repeated eigenvalue may
/// be reported once.
pub trait EigenSolver: Sync {
    fn solve_extreme(
        &self,
        matrix: &CsrMatrix,
        k: usize,
        which: Which,
    ) -> Result<Vec<f64>, SolverError>;
}

/// The two eigenvalues the diffusion coefficients depend on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EigenPair {
    /// Smallest non-trivial eigenvalue.
    pub lambda_2: f64,
    /// Largest-magnitude eigenvalue.
    pub lambda_n: f64,
}

/// Compute `(λ₂, λₙ)`.
///
/// λ₂ comes from the two smallest-magnitude eigenvalues with the one closest
/// to zero (the uniform mode) dropped.
pub fn extreme_eigenvalues<S: EigenSolver + ?Sized>(
    solver: &S,
    matrix: &CsrMatrix,
) -> Result<EigenPair, SolverError> {
    let small = solver.solve_extreme(matrix, 2, Which::SmallestMagnitude)?;
    if small.len() < 2 {
        return Err(SolverError::TooFewEigenvalues {
            requested: 2,
            dim: matrix.nrows(),
        });
    }
    let lambda_2 = if small[0].abs() > small[1].abs() {
        small[0]
    } else {
        small[1]
    };

    let large = solver.solve_extreme(matrix, 1, Which::LargestMagnitude)?;
    let lambda_n = large.first().copied().ok_or(SolverError::TooFewEigenvalues {
        requested: 1,
        dim: matrix.nrows(),
    })?;

    Ok(EigenPair { lambda_2, lambda_n })
}

/// Tuning for [`LanczosSolver`].
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Relative residual bound on each requested Ritz pair.
    pub tolerance: f64,
    /// Cap on matrix-vector products.
    pub max_iterations: usize,
    /// Ritz values are recomputed every this many iterations.
    pub check_every: usize,
    /// Seed for the start vector.
    pub seed: u64,
    /// Wall-clock budget per call; `None` iterates until convergence or the cap.
    pub timeout: Option<Duration>,
    /// Number of Lanczos vectors held at once. When the basis fills up it is
    /// thick-restarted from the best Ritz vectors.
    ///
    /// `None` keeps every vector, which costs `8 * n * max_iterations` bytes
    /// per call: about 4 GB for a 100x100x100 grid at the default cap. Set a
    /// bound (20 to 100 is typical) for grids past roughly 50 cells per axis.
    pub max_basis: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 500,
            check_every: 10,
            seed: 0x5eed_1a9c,
            timeout: None,
            max_basis: None,
        }
    }
}

/// Symmetric Lanczos with full re-orthogonalisation.
#[derive(Clone, Debug, Default)]
pub struct LanczosSolver {
    pub config: SolverConfig,
}

impl LanczosSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

/// Threshold below which the next Lanczos vector is treated as zero.
const BREAKDOWN_TOL: f64 = 1e-12;

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Subtract the projection of `w` onto every basis vector, twice. Returns
/// the accumulated coefficients, i.e. `basis[i] . w` before the call.
fn orthogonalize(w: &mut [f64], basis: &[Vec<f64>]) -> Vec<f64> {
    let mut coeffs = vec![0.0; basis.len()];
    for _ in 0..2 {
        for (v, total) in basis.iter().zip(coeffs.iter_mut()) {
            let c = dot(w, v);
            for (wi, vi) in w.iter_mut().zip(v) {
                *wi -= c * vi;
            }
            *total += c;
        }
    }
    coeffs
}

/// Random unit vector orthogonal to `basis`, or `None` if the basis already
/// spans the space.
fn fresh_direction(rng: &mut StdRng, n: usize, basis: &[Vec<f64>]) -> Option<Vec<f64>> {
    let mut v: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    orthogonalize(&mut v, basis);
    let len = norm(&v);
    if len <= BREAKDOWN_TOL * (n as f64).sqrt() {
        return None;
    }
    v.iter_mut().for_each(|x| *x /= len);
    Some(v)
}

#[derive(Clone, Copy, Debug)]
struct Ritz {
    theta: f64,
    residual: f64,
    /// Column of the eigenvector matrix.
    col: usize,
}

/// Ritz pairs of the leading `m x m` block of the projected matrix, ordered
/// by `which`, with the eigenvectors for restarting.
fn ritz_pairs(
    projected: &DMatrix<f64>,
    m: usize,
    last_beta: f64,
    which: Which,
) -> (Vec<Ritz>, DMatrix<f64>) {
    let h = DMatrix::from_fn(m, m, |i, j| projected[(i, j)]);
    let eig = SymmetricEigen::new(h);
    let mut ritz: Vec<Ritz> = (0..m)
        .map(|col| Ritz {
            theta: eig.eigenvalues[col],
            residual: (last_beta * eig.eigenvectors[(m - 1, col)]).abs(),
            col,
        })
        .collect();

    match which {
        Which::SmallestMagnitude => ritz.sort_by(|a, b| a.theta.abs().total_cmp(&b.theta.abs())),
        Which::LargestMagnitude => ritz.sort_by(|a, b| b.theta.abs().total_cmp(&a.theta.abs())),
    }
    (ritz, eig.eigenvectors)
}

/// Ritz vectors `basis * vectors[:, col]` for each kept pair.
fn ritz_vectors(basis: &[Vec<f64>], vectors: &DMatrix<f64>, kept: &[Ritz]) -> Vec<Vec<f64>> {
    let n = basis.first().map_or(0, Vec::len);
    kept.iter()
        .map(|r| {
            let mut y = vec![0.0; n];
            for (j, v) in basis.iter().enumerate() {
                let s = vectors[(j, r.col)];
                for (yi, vi) in y.iter_mut().zip(v) {
                    *yi += s * vi;
                }
            }
            y
        })
        .collect()
}

impl EigenSolver for LanczosSolver {
    fn solve_extreme(
        &self,
        matrix: &CsrMatrix,
        k: usize,
        which: Which,
    ) -> Result<Vec<f64>, SolverError> {
        let n = matrix.nrows();
        if k > n {
            return Err(SolverError::TooFewEigenvalues { requested: k, dim: n });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let cfg = &self.config;
        let started = Instant::now();
        let max_iterations = cfg.max_iterations.max(k);
        // Room for the k wanted vectors plus at least two new ones per cycle
        let max_basis = cfg
            .max_basis
            .map_or(n, |b| b.max(k + 2))
            .min(n)
            .min(max_iterations);
        let check_every = cfg.check_every.max(1);

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut basis: Vec<Vec<f64>> = Vec::with_capacity(max_basis);
        // V^T A V, filled column by column from the Gram-Schmidt coefficients
        let mut projected = DMatrix::<f64>::zeros(max_basis, max_basis);
        let mut w = vec![0.0; n];
        let mut iterations = 0;

        let Some(mut q) = fresh_direction(&mut rng, n, &basis) else {
            return Err(SolverError::NoConvergence { iterations: 0 });
        };

        while iterations < max_iterations {
            if let Some(limit) = cfg.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(SolverError::Timeout { elapsed });
                }
            }

            matrix.mul_vec(&q, &mut w);
            basis.push(q);
            let j = basis.len() - 1;
            for (i, c) in orthogonalize(&mut w, &basis).into_iter().enumerate() {
                projected[(i, j)] = c;
                projected[(j, i)] = c;
            }
            let beta = norm(&w);
            iterations += 1;

            let m = basis.len();
            let spanned = m == n;
            let breakdown = beta <= BREAKDOWN_TOL * projected[(j, j)].abs().max(1.0);
            let full = m == max_basis;
            let last = iterations == max_iterations;

            if m >= k && (spanned || breakdown || full || last || iterations % check_every == 0) {
                let last_beta = if spanned || breakdown { 0.0 } else { beta };
                let (ritz, vectors) = ritz_pairs(&projected, m, last_beta, which);
                let converged = ritz[..k]
                    .iter()
                    .all(|r| r.residual <= cfg.tolerance * r.theta.abs().max(1.0));
                trace!(iteration = iterations, ?which, converged, "lanczos checkpoint");

                if converged {
                    return Ok(ritz[..k].iter().map(|r| r.theta).collect());
                }

                if full && !spanned && !last {
                    let keep = k + (max_basis - k) / 2;
                    basis = ritz_vectors(&basis, &vectors, &ritz[..keep]);
                    projected.fill(0.0);
                    for (i, r) in ritz[..keep].iter().enumerate() {
                        projected[(i, i)] = r.theta;
                    }
                    trace!(iteration = iterations, kept = keep, "lanczos restart");
                }
            }

            if spanned {
                break;
            }

            // w is orthogonal to the old basis, and so to any restarted one
            q = if breakdown {
                match fresh_direction(&mut rng, n, &basis) {
                    Some(v) => v,
                    None => break,
                }
            } else {
                w.iter().map(|x| x / beta).collect()
            };
        }

        Err(SolverError::NoConvergence { iterations })
    }
}

/// Full dense diagonalisation through nalgebra.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseSolver;

impl DenseSolver {
    /// Every eigenvalue, ascending.
    pub fn spectrum(matrix: &CsrMatrix) -> Vec<f64> {
        let mut values: Vec<f64> = SymmetricEigen::new(matrix.to_dense())
            .eigenvalues
            .iter()
            .copied()
            .collect();
        values.sort_by(f64::total_cmp);
        values
    }
}

impl EigenSolver for DenseSolver {
    fn solve_extreme(
        &self,
        matrix: &CsrMatrix,
        k: usize,
        which: Which,
    ) -> Result<Vec<f64>, SolverError> {
        let n = matrix.nrows();
        if k > n {
            return Err(SolverError::TooFewEigenvalues { requested: k, dim: n });
        }

        let mut values = Self::spectrum(matrix);
        match which {
            Which::SmallestMagnitude => values.sort_by(|a, b| a.abs().total_cmp(&b.abs())),
            Which::LargestMagnitude => values.sort_by(|a, b| b.abs().total_cmp(&a.abs())),
        }
        values.truncate(k);
        Ok(values)
    }
}
