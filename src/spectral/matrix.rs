//! Sparse assembly of the periodic-grid diffusion matrix.
//!
//! Assembly is two-phase:
//! - Push `(row, col, value)` triplets onto an append-only list
//! - Convert once into compressed sparse rows
//!
//! Nothing reads a partially built matrix. The conversion rejects repeated
//! coordinates instead of summing or overwriting them.

use nalgebra::DMatrix;
use tracing::debug;

use super::grid::{cells, linearize, neighbors, GridSize, NEIGHBORHOOD_SIZE};
use crate::error::{DiffusionError, DiffusionResult};

/// Weight of each of the 26 neighbour couplings.
pub const NEIGHBOR_WEIGHT: f64 = -1.0 / NEIGHBORHOOD_SIZE as f64;

/// Weight on the diagonal; makes every row sum to zero.
pub const SELF_WEIGHT: f64 = 1.0 - 1.0 / NEIGHBORHOOD_SIZE as f64;

/// Append-only coordinate list.
#[derive(Debug, Clone)]
pub struct TripletList {
    dim: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl TripletList {
    /// Empty list for a square `dim x dim` matrix.
    pub fn new(dim: usize) -> Self {
        TripletList {
            dim,
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        TripletList {
            dim,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append one entry. Out-of-range coordinates are a programming error.
    #[inline]
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.dim && col < self.dim);
        self.entries.push((row, col, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the list into CSR form.
    ///
    /// Fails with [`DiffusionError::DuplicateEntry`] if a coordinate was
    /// pushed more than once.
    pub fn into_csr(mut self) -> DiffusionResult<CsrMatrix> {
        self.entries.sort_unstable_by_key(|&(row, col, _)| (row, col));

        let mut row_ptr = vec![0usize; self.dim + 1];
        let mut col_idx = Vec::with_capacity(self.entries.len());
        let mut values = Vec::with_capacity(self.entries.len());

        let mut prev: Option<(usize, usize)> = None;
        for &(row, col, value) in &self.entries {
            if prev == Some((row, col)) {
                return Err(DiffusionError::DuplicateEntry { row, col });
            }
            prev = Some((row, col));

            row_ptr[row + 1] += 1;
            col_idx.push(col);
            values.push(value);
        }

        for r in 0..self.dim {
            row_ptr[r + 1] += row_ptr[r];
        }

        Ok(CsrMatrix {
            dim: self.dim,
            row_ptr,
            col_idx,
            values,
        })
    }
}

/// Square sparse matrix in compressed sparse row format.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    dim: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    pub fn nrows(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored `(col, value)` pairs of row `i`, ascending by column.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    /// Entry `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[span.clone()].binary_search(&j) {
            Ok(pos) => self.values[span.start + pos],
            Err(_) => 0.0,
        }
    }

    /// `y = A x`.
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dim);
        debug_assert_eq!(y.len(), self.dim);

        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row(i).map(|(j, v)| v * x[j]).sum();
        }
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.dim)
            .map(|i| self.row(i).map(|(_, v)| v).sum::<f64>())
            .collect()
    }

    /// True if `|A[i,j] - A[j,i]| <= tol` for every stored entry.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.dim).all(|i| self.row(i).all(|(j, v)| (v - self.get(j, i)).abs() <= tol))
    }

    /// Dense copy, for reference checks on small grids.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.dim, self.dim);
        for i in 0..self.dim {
            for (j, v) in self.row(i) {
                dense[(i, j)] = v;
            }
        }
        dense
    }
}

/// Build the diffusion matrix `I - M` for a periodic grid, where `M` averages
/// each cell over its 27-cell neighbourhood.
///
/// Every axis must have at least 3 cells; this is checked before any entry
/// is pushed.
pub fn build_adjacency(size: GridSize) -> DiffusionResult<CsrMatrix> {
    size.validate_neighborhood()?;

    let ncells = size.ncells();
    let mut triplets = TripletList::with_capacity(ncells, ncells * NEIGHBORHOOD_SIZE);

    for cell in cells(size) {
        let i = linearize(cell, size);
        for neighbor in neighbors(cell, size) {
            let j = linearize(neighbor, size);
            let weight = if i == j { SELF_WEIGHT } else { NEIGHBOR_WEIGHT };
            triplets.push(i, j, weight);
        }
    }

    let matrix = triplets.into_csr()?;
    debug!(grid_size = %size, ncells, nnz = matrix.nnz(), "assembled diffusion matrix");
    Ok(matrix)
}
