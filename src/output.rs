//! Result table persistence.
//!
//! One row per grid size, columns `grid_size alpha beta gamma`, separated by
//! single spaces. Every value is written in `%.18e` style
//! (`4.000000000000000000e+00`), the layout numpy's `savetxt` produces, so
//! existing plotting scripts can load the file unchanged.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{DiffusionError, DiffusionResult};
use crate::sweep::SweepRow;

/// Default file name of the result table.
pub const RESULT_FILE: &str = "result.txt";

/// One parsed line of a result table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableRow {
    pub grid_size: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl From<&SweepRow> for TableRow {
    fn from(row: &SweepRow) -> Self {
        TableRow {
            grid_size: row.grid_size as f64,
            alpha: row.params.alpha,
            beta: row.params.beta,
            gamma: row.params.gamma,
        }
    }
}

/// Format a value with 18 fractional digits and a signed, at least two-digit
/// exponent.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let raw = format!("{:.18e}", value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

/// Write the table, one line per row. An empty slice produces an empty file.
pub fn write_table(path: &Path, rows: &[SweepRow]) -> DiffusionResult<()> {
    let io_err = |source| DiffusionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);

    for row in rows {
        let t = TableRow::from(row);
        writeln!(
            out,
            "{} {} {} {}",
            format_sci(t.grid_size),
            format_sci(t.alpha),
            format_sci(t.beta),
            format_sci(t.gamma)
        )
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    info!(path = %path.display(), rows = rows.len(), "wrote result table");
    Ok(())
}

/// Read a table written by [`write_table`]. Blank lines and `#` comments
/// are skipped.
pub fn read_table(path: &Path) -> DiffusionResult<Vec<TableRow>> {
    let io_err = |source| DiffusionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut rows = Vec::new();

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let values = trimmed
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DiffusionError::Parse {
                line: lineno + 1,
                msg: e.to_string(),
            })?;

        let [grid_size, alpha, beta, gamma] = values[..] else {
            return Err(DiffusionError::Parse {
                line: lineno + 1,
                msg: format!("expected 4 columns, found {}", values.len()),
            });
        };
        rows.push(TableRow {
            grid_size,
            alpha,
            beta,
            gamma,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{DiffusionParams, EigenPair};
    use std::fs;
    use tempfile::TempDir;

    fn row(gs: usize, alpha: f64, beta: f64, gamma: f64) -> SweepRow {
        SweepRow {
            grid_size: gs,
            eigen: EigenPair {
                lambda_2: 0.5,
                lambda_n: 1.0,
            },
            params: DiffusionParams { alpha, beta, gamma },
        }
    }

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(4.0), "4.000000000000000000e+00");
        assert_eq!(format_sci(0.0), "0.000000000000000000e+00");
        assert_eq!(format_sci(12.0), "1.200000000000000000e+01");
        assert_eq!(format_sci(-0.25), "-2.500000000000000000e-01");
        assert_eq!(format_sci(1e-120), "9.999999999999999786e-121");
        // Digits past the shortest round-trip form come from the exact binary value
        assert_eq!(format_sci(0.1), "1.000000000000000056e-01");
        assert_eq!(format_sci(2f64.powi(-100)), "7.888609052210118054e-31");
        assert_eq!(format_sci(f64::NAN), "nan");
    }

    #[test]
    fn test_write_table_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RESULT_FILE);
        write_table(&path, &[row(3, 1.0, 1.0, 0.0), row(4, 1.0, 1.0294, 0.25)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "3.000000000000000000e+00 1.000000000000000000e+00 \
             1.000000000000000000e+00 0.000000000000000000e+00"
        );
        assert_eq!(lines[1].split_whitespace().count(), 4);
    }

    #[test]
    fn test_empty_table_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RESULT_FILE);
        write_table(&path, &[]).unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(read_table(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_back_written_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RESULT_FILE);
        let rows = [row(5, 0.87, 1.12, 0.47), row(6, 0.91, 1.3, 0.61)];
        write_table(&path, &rows).unwrap();

        let parsed = read_table(&path).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], TableRow::from(&rows[0]));
        assert_eq!(parsed[1].grid_size, 6.0);
    }

    #[test]
    fn test_read_table_rejects_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "# header\n3 1 1 0\n\n4 1 1\n").unwrap();

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, DiffusionError::Parse { line: 4, .. }));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join(RESULT_FILE);
        let err = write_table(&path, &[]).unwrap_err();
        assert!(matches!(err, DiffusionError::Io { .. }));
    }
}
