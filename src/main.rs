//! `grid-diffusion` - diffusion coefficients over a range of grid sizes.
//!
//! **Usage:**
//! ```text
//! grid-diffusion START STOP [STEP] [-n NPROC] [-p] [-o result.txt]
//! ```
//!
//! Writes one `grid_size alpha beta gamma` row per size to the result file.
//! With `-p`, `alpha.svg`, `beta.svg` and `gamma.svg` are written next to it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use grid_diffusion::output::{write_table, RESULT_FILE};
use grid_diffusion::plot::{PlotSink, SvgPlotter};
use grid_diffusion::{
    run_sweep, DenseSolver, EigenSolver, FailurePolicy, GridRange, LanczosSolver, SolverConfig,
    SweepConfig, SweepReport, SweepRow,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Sparse Lanczos iteration.
    Lanczos,
    /// Dense diagonalisation; small grids only.
    Dense,
}

/// Calculate alpha, beta and gamma for regular, fully periodic Cartesian grids.
#[derive(Parser, Debug)]
#[command(name = "grid-diffusion", version, about)]
struct Args {
    /// First grid size (inclusive).
    #[arg(value_name = "START")]
    start: usize,

    /// Last grid size (exclusive).
    #[arg(value_name = "STOP")]
    stop: usize,

    /// Grid size increment.
    #[arg(value_name = "STEP", default_value_t = 1)]
    step: usize,

    /// Number of worker threads.
    #[arg(short = 'n', value_name = "NPROC", default_value_t = 1)]
    nproc: usize,

    /// Plot alpha, beta and gamma against grid size.
    #[arg(short = 'p')]
    plot: bool,

    /// Result table path.
    #[arg(short, long, default_value = RESULT_FILE)]
    output: PathBuf,

    /// Per grid size solver budget in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Keep computing after a grid size fails and write the partial table.
    #[arg(long)]
    keep_going: bool,

    /// Eigensolver back end.
    #[arg(long, value_enum, default_value_t = Backend::Lanczos)]
    solver: Backend,

    /// Relative residual tolerance of the Lanczos solver [default: 1e-10].
    #[arg(long)]
    tol: Option<f64>,

    /// Maximum Lanczos iterations [default: 500].
    #[arg(long)]
    max_iter: Option<usize>,

    /// Lanczos vectors held at once; the basis is restarted when full.
    /// Unbounded by default.
    #[arg(long, value_name = "VECTORS")]
    max_basis: Option<usize>,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "grid_diffusion=debug"
    } else {
        "grid_diffusion=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn solver_from(args: &Args) -> Result<Box<dyn EigenSolver>> {
    let timeout = args
        .timeout
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("invalid --timeout")?;

    let solver: Box<dyn EigenSolver> = match args.solver {
        Backend::Lanczos => {
            let defaults = SolverConfig::default();
            Box::new(LanczosSolver::new(SolverConfig {
                tolerance: args.tol.unwrap_or(defaults.tolerance),
                max_iterations: args.max_iter.unwrap_or(defaults.max_iterations),
                timeout,
                max_basis: args.max_basis,
                ..defaults
            }))
        }
        Backend::Dense => {
            // The dense back end has no iteration to tune or interrupt
            let tuned = timeout.is_some()
                || args.tol.is_some()
                || args.max_iter.is_some()
                || args.max_basis.is_some();
            if tuned {
                bail!("--timeout, --tol, --max-iter and --max-basis only apply to --solver lanczos");
            }
            Box::new(DenseSolver)
        }
    };
    Ok(solver)
}

fn format_column(report: &SweepReport, pick: impl Fn(&SweepRow) -> f64) -> String {
    let values: Vec<String> = report.rows.iter().map(|r| format!("{:.8}", pick(r))).collect();
    format!("[{}]", values.join(" "))
}

fn run(args: &Args) -> Result<bool> {
    let solver = solver_from(args)?;

    let config = SweepConfig {
        range: GridRange::new(args.start, args.stop).with_step(args.step),
        workers: args.nproc,
        policy: if args.keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::Abort
        },
    };

    let report = run_sweep(&config, solver.as_ref()).context("sweep failed")?;

    println!("==========================");
    println!("Alphas: {}", format_column(&report, |r| r.params.alpha));
    println!("Betas:  {}", format_column(&report, |r| r.params.beta));
    println!("Gammas: {}", format_column(&report, |r| r.params.gamma));

    write_table(&args.output, &report.rows)
        .with_context(|| format!("writing {}", args.output.display()))?;

    if args.plot {
        let dir = args
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        SvgPlotter::new(dir)
            .render(&report.rows)
            .context("rendering plots")?;
    }

    for failure in &report.failures {
        eprintln!("error: {}", failure.chain());
    }
    Ok(report.is_complete())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
