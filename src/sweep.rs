//! Parallel sweep over a range of cubic grid sizes.
//!
//! Each grid size is an independent unit of work (assemble, solve, derive)
//! scheduled on a bounded rayon pool. Units share nothing but the solver,
//! which is read-only. Outcomes are tagged with their submission slot and
//! sorted back into range order before anything is reported.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{error, info};

use crate::error::{DiffusionError, DiffusionResult};
use crate::spectral::{
    build_adjacency, derive_params, extreme_eigenvalues, DiffusionParams, EigenPair, EigenSolver,
    GridSize,
};

/// Half-open range of grid sizes, `start..stop` by `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl GridRange {
    pub fn new(start: usize, stop: usize) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Grid sizes in ascending order. Empty when `stop <= start`.
    /// A zero step yields nothing; [`validate`] rejects it first.
    pub fn sizes(&self) -> Vec<usize> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..self.stop).step_by(self.step).collect()
    }
}

/// What to do when one grid size fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Discard everything and return the first failure in range order.
    #[default]
    Abort,
    /// Keep successful rows and collect failures alongside them.
    KeepGoing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    pub range: GridRange,
    /// Size of the worker pool; 1 runs the units one after another.
    pub workers: usize,
    pub policy: FailurePolicy,
}

impl SweepConfig {
    pub fn new(range: GridRange) -> Self {
        Self {
            range,
            workers: 1,
            policy: FailurePolicy::default(),
        }
    }
}

/// Result for one grid size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepRow {
    pub grid_size: usize,
    pub eigen: EigenPair,
    pub params: DiffusionParams,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    /// Successful rows in ascending grid-size order.
    pub rows: Vec<SweepRow>,
    /// Failed units; only populated under [`FailurePolicy::KeepGoing`].
    pub failures: Vec<DiffusionError>,
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Check the whole configuration before any work is dispatched.
/// Returns the grid sizes to process.
pub fn validate(config: &SweepConfig) -> DiffusionResult<Vec<usize>> {
    if config.range.step == 0 {
        return Err(DiffusionError::InvalidStep(config.range.step));
    }
    if config.workers == 0 {
        return Err(DiffusionError::InvalidWorkers(config.workers));
    }

    let sizes = config.range.sizes();
    for &gs in &sizes {
        GridSize::cubic(gs).validate_neighborhood()?;
    }
    Ok(sizes)
}

/// Run the full pipeline for one cubic grid size.
pub fn compute_unit<S: EigenSolver + ?Sized>(gs: usize, solver: &S) -> DiffusionResult<SweepRow> {
    let size = GridSize::cubic(gs);
    let matrix = build_adjacency(size).map_err(|e| e.in_unit(size))?;

    let eigen = extreme_eigenvalues(solver, &matrix).map_err(|source| {
        DiffusionError::Convergence {
            grid_size: size,
            source,
        }
    })?;
    let params = derive_params(eigen).map_err(|e| e.in_unit(size))?;

    info!(
        grid_size = %size,
        lambda_2 = eigen.lambda_2,
        lambda_n = eigen.lambda_n,
        alpha = params.alpha,
        gamma = params.gamma,
        beta = params.beta,
        "grid size done"
    );

    Ok(SweepRow {
        grid_size: gs,
        eigen,
        params,
    })
}

/// Compute every grid size in the configured range.
pub fn run_sweep<S: EigenSolver + ?Sized>(
    config: &SweepConfig,
    solver: &S,
) -> DiffusionResult<SweepReport> {
    let sizes = validate(config)?;
    if sizes.is_empty() {
        info!("empty grid-size range, nothing to compute");
        return Ok(SweepReport::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("sweep-{i}"))
        .build()
        .map_err(|e| DiffusionError::ThreadPool(e.to_string()))?;

    info!(units = sizes.len(), workers = config.workers, "starting sweep");
    let started = Instant::now();

    let mut outcomes: Vec<(usize, DiffusionResult<SweepRow>)> = pool.install(|| {
        sizes
            .par_iter()
            .enumerate()
            .map(|(slot, &gs)| (slot, compute_unit(gs, solver)))
            .collect()
    });

    // Completion order is arbitrary; the submission slot is authoritative.
    outcomes.sort_by_key(|(slot, _)| *slot);

    let mut report = SweepReport::default();
    for (_, outcome) in outcomes {
        match outcome {
            Ok(row) => report.rows.push(row),
            Err(e) => match config.policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::KeepGoing => {
                    error!(error = %e.chain(), "grid size failed, continuing");
                    report.failures.push(e);
                }
            },
        }
    }

    info!(
        rows = report.rows.len(),
        failures = report.failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::spectral::{CsrMatrix, DenseSolver, LanczosSolver, Which};

    /// Fails on one matrix dimension, delegates to the dense solver otherwise.
    struct FailOn(usize);

    impl EigenSolver for FailOn {
        fn solve_extreme(
            &self,
            matrix: &CsrMatrix,
            k: usize,
            which: Which,
        ) -> Result<Vec<f64>, SolverError> {
            if matrix.nrows() == self.0 {
                return Err(SolverError::NoConvergence { iterations: 7 });
            }
            DenseSolver.solve_extreme(matrix, k, which)
        }
    }

    /// Returns a zero spectrum, which the coefficient derivation must reject.
    struct Degenerate;

    impl EigenSolver for Degenerate {
        fn solve_extreme(
            &self,
            _matrix: &CsrMatrix,
            k: usize,
            _which: Which,
        ) -> Result<Vec<f64>, SolverError> {
            Ok(vec![0.0; k])
        }
    }

    #[test]
    fn test_range_sizes() {
        assert_eq!(GridRange::new(3, 7).sizes(), vec![3, 4, 5, 6]);
        assert_eq!(GridRange::new(3, 10).with_step(3).sizes(), vec![3, 6, 9]);
        assert!(GridRange::new(5, 5).sizes().is_empty());
        assert!(GridRange::new(8, 4).sizes().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let config = SweepConfig::new(GridRange::new(3, 6).with_step(0));
        assert!(matches!(validate(&config), Err(DiffusionError::InvalidStep(0))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = SweepConfig::new(GridRange::new(3, 6));
        config.workers = 0;
        assert!(matches!(validate(&config), Err(DiffusionError::InvalidWorkers(0))));
    }

    #[test]
    fn test_validate_rejects_small_grid_before_dispatch() {
        let config = SweepConfig::new(GridRange::new(2, 6));
        let err = run_sweep(&config, &FailOn(usize::MAX)).unwrap_err();
        match err {
            DiffusionError::Precondition { grid_size, .. } => {
                assert_eq!(grid_size, GridSize::cubic(2))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_range() {
        let config = SweepConfig::new(GridRange::new(5, 5));
        let report = run_sweep(&config, &LanczosSolver::default()).unwrap();
        assert!(report.rows.is_empty());
        assert!(report.is_complete());
    }

    #[test]
    fn test_compute_unit() {
        let row = compute_unit(4, &DenseSolver).unwrap();
        assert_eq!(row.grid_size, 4);
        assert!((row.eigen.lambda_2 - 2.0 / 3.0).abs() < 1e-9);
        assert!((row.eigen.lambda_n - 4.0 / 3.0).abs() < 1e-9);
        assert!((row.params.alpha - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_errors_name_grid_size() {
        let err = compute_unit(3, &Degenerate).unwrap_err();
        assert_eq!(err.grid_size(), Some(GridSize::cubic(3)));
        assert!(err.to_string().contains("3x3x3"));
    }

    #[test]
    fn test_abort_discards_all_rows() {
        let mut config = SweepConfig::new(GridRange::new(3, 7));
        config.workers = 2;
        // 4^3 = 64 cells
        let err = run_sweep(&config, &FailOn(64)).unwrap_err();
        match err {
            DiffusionError::Convergence { grid_size, source } => {
                assert_eq!(grid_size, GridSize::cubic(4));
                assert_eq!(source, SolverError::NoConvergence { iterations: 7 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_keep_going_collects_failures() {
        let mut config = SweepConfig::new(GridRange::new(3, 7));
        config.workers = 3;
        config.policy = FailurePolicy::KeepGoing;

        let report = run_sweep(&config, &FailOn(125)).unwrap();
        let sizes: Vec<_> = report.rows.iter().map(|r| r.grid_size).collect();
        assert_eq!(sizes, vec![3, 4, 6]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].grid_size(), Some(GridSize::cubic(5)));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_rows_in_range_order() {
        let mut config = SweepConfig::new(GridRange::new(3, 9));
        config.workers = 4;
        let report = run_sweep(&config, &LanczosSolver::default()).unwrap();
        let sizes: Vec<_> = report.rows.iter().map(|r| r.grid_size).collect();
        assert_eq!(sizes, vec![3, 4, 5, 6, 7, 8]);
    }
}
