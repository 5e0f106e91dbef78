//! First- and second-order diffusion coefficients from the eigenvalue pair.
//!
//! With λ₂ the smallest non-trivial and λₙ the largest eigenvalue:
//! - α = 2 / (λ₂ + λₙ), the optimal first-order relaxation factor
//! - γ = (λₙ − λ₂) / (λₙ + λ₂), the contraction ratio of first-order diffusion
//! - β = 2 / (1 + √(1 − γ²)), the second-order over-relaxation factor

use super::solver::EigenPair;
use crate::error::{DiffusionError, DiffusionResult};

/// Coefficients for one grid size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffusionParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Derive `(α, β, γ)`, rejecting pairs for which they are undefined.
pub fn derive_params(pair: EigenPair) -> DiffusionResult<DiffusionParams> {
    let EigenPair { lambda_2, lambda_n } = pair;

    // `!(x > 0)` also catches NaN
    if !(lambda_2 > 0.0 && lambda_n > 0.0) || !lambda_2.is_finite() || !lambda_n.is_finite() {
        return Err(DiffusionError::InvalidEigenvalue { lambda_2, lambda_n });
    }

    let sum = lambda_2 + lambda_n;
    let alpha = 2.0 / sum;
    let gamma = (lambda_n - lambda_2) / sum;
    if gamma >= 1.0 {
        return Err(DiffusionError::InvalidGamma { gamma });
    }
    let beta = 2.0 / (1.0 + (1.0 - gamma * gamma).sqrt());

    Ok(DiffusionParams { alpha, beta, gamma })
}
