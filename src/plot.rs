//! Scatter plots of the coefficients against grid size.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DiffusionError, DiffusionResult};
use crate::sweep::SweepRow;

/// Consumer of a finished sweep table.
pub trait PlotSink {
    /// Render the rows; returns the files written.
    fn render(&self, rows: &[SweepRow]) -> DiffusionResult<Vec<PathBuf>>;
}

/// One plotted coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Series {
    Alpha,
    Beta,
    Gamma,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Alpha, Series::Beta, Series::Gamma];

    pub fn title(&self) -> &'static str {
        match self {
            Series::Alpha => "Alpha",
            Series::Beta => "Beta",
            Series::Gamma => "Gamma",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            Series::Alpha => "alpha",
            Series::Beta => "beta",
            Series::Gamma => "gamma",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Series::Alpha => "green",
            Series::Beta => "red",
            Series::Gamma => "blue",
        }
    }

    fn value(&self, row: &SweepRow) -> f64 {
        match self {
            Series::Alpha => row.params.alpha,
            Series::Beta => row.params.beta,
            Series::Gamma => row.params.gamma,
        }
    }
}

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 60.0;
const MARKER: f64 = 4.0;

/// Writes `alpha.svg`, `beta.svg` and `gamma.svg` into a directory.
#[derive(Clone, Debug)]
pub struct SvgPlotter {
    pub dir: PathBuf,
}

impl SvgPlotter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, series: Series) -> PathBuf {
        self.dir.join(format!("{}.svg", series.file_stem()))
    }
}

/// Pad a degenerate `[lo, hi]` interval so it can be scaled.
fn span(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

/// Render one series as an SVG document.
pub fn render_svg(series: Series, rows: &[SweepRow]) -> String {
    let xs: Vec<f64> = rows.iter().map(|r| r.grid_size as f64).collect();
    let ys: Vec<f64> = rows.iter().map(|r| series.value(r)).collect();

    let (x_lo, x_hi) = span(
        xs.iter().copied().fold(f64::INFINITY, f64::min),
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );
    let (y_lo, y_hi) = span(
        ys.iter().copied().fold(f64::INFINITY, f64::min),
        ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );

    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let px = |x: f64| MARGIN + (x - x_lo) / (x_hi - x_lo) * plot_w;
    let py = |y: f64| HEIGHT - MARGIN - (y - y_lo) / (y_hi - y_lo) * plot_h;

    let mut svg = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="16">{}</text>"#,
        WIDTH / 2.0,
        series.title()
    );
    let _ = writeln!(
        svg,
        r#"<rect x="{MARGIN}" y="{MARGIN}" width="{plot_w}" height="{plot_h}" fill="none" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">Grid size</text>"#,
        WIDTH / 2.0,
        HEIGHT - 15.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="15" y="{}" text-anchor="middle" transform="rotate(-90 15 {})">{}</text>"#,
        HEIGHT / 2.0,
        HEIGHT / 2.0,
        series.title()
    );

    // Axis extremes
    let _ = writeln!(
        svg,
        r#"<text x="{MARGIN}" y="{}" text-anchor="middle">{x_lo}</text>"#,
        HEIGHT - MARGIN + 18.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">{x_hi}</text>"#,
        WIDTH - MARGIN,
        HEIGHT - MARGIN + 18.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end">{:.4}</text>"#,
        MARGIN - 6.0,
        HEIGHT - MARGIN,
        y_lo
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end">{:.4}</text>"#,
        MARGIN - 6.0,
        MARGIN + 4.0,
        y_hi
    );

    for (&x, &y) in xs.iter().zip(&ys) {
        let (cx, cy) = (px(x), py(y));
        let _ = writeln!(
            svg,
            r#"<path d="M{} {} L{} {} M{} {} L{} {}" stroke="{}" stroke-width="1.5"/>"#,
            cx - MARKER,
            cy - MARKER,
            cx + MARKER,
            cy + MARKER,
            cx - MARKER,
            cy + MARKER,
            cx + MARKER,
            cy - MARKER,
            series.color()
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn write_file(path: &Path, contents: &str) -> DiffusionResult<()> {
    fs::write(path, contents).map_err(|source| DiffusionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl PlotSink for SvgPlotter {
    fn render(&self, rows: &[SweepRow]) -> DiffusionResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(Series::ALL.len());
        for series in Series::ALL {
            let path = self.path_for(series);
            write_file(&path, &render_svg(series, rows))?;
            written.push(path);
        }
        info!(files = written.len(), dir = %self.dir.display(), "rendered plots");
        Ok(written)
    }
}
