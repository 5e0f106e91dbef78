//! Periodic grid topology: cell linearisation and the 27-cell neighbourhood.

use std::fmt;

use crate::error::{DiffusionError, DiffusionResult};

/// Smallest per-axis size for which all 27 neighbourhood offsets land on
/// distinct cells.
pub const MIN_GRID_SIZE: usize = 3;

/// Number of cells in the neighbourhood, self included.
pub const NEIGHBORHOOD_SIZE: usize = 27;

/// Position of the zero offset `(0, 0, 0)` in the output of [`neighbors`].
pub const SELF_SLOT: usize = 13;

/// A 3D cell coordinate, each component in `[0, size[d])`.
pub type CellIndex = [usize; 3];

/// Number of cells per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize(pub [usize; 3]);

impl GridSize {
    /// A cube with `gs` cells along every axis.
    pub const fn cubic(gs: usize) -> Self {
        GridSize([gs, gs, gs])
    }

    /// Total number of cells.
    pub fn ncells(&self) -> usize {
        self.0.iter().product()
    }

    /// Smallest axis length.
    pub fn min_axis(&self) -> usize {
        self.0.iter().copied().min().unwrap_or(0)
    }

    /// Fail unless every axis has at least [`MIN_GRID_SIZE`] cells.
    ///
    /// Below that, offsets +1 and -1 (or 0 and ±1) wrap onto the same cell
    /// and the assembled operator would no longer conserve load.
    pub fn validate_neighborhood(&self) -> DiffusionResult<()> {
        if self.min_axis() < MIN_GRID_SIZE {
            return Err(DiffusionError::Precondition {
                grid_size: *self,
                min: MIN_GRID_SIZE,
            });
        }
        Ok(())
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Calculate the linear index for a 3D coordinate (row-major, last axis fastest).
#[inline]
pub fn linearize(idx: CellIndex, size: GridSize) -> usize {
    (idx[0] * size.0[1] + idx[1]) * size.0[2] + idx[2]
}

/// Inverse of [`linearize`].
#[inline]
pub fn delinearize(linear: usize, size: GridSize) -> CellIndex {
    let i2 = linear % size.0[2];
    let rest = linear / size.0[2];
    [rest / size.0[1], rest % size.0[1], i2]
}

/// Add a signed offset to a coordinate, wrapping into `[0, len)`.
#[inline]
fn wrap(coord: usize, offset: isize, len: usize) -> usize {
    (coord as isize + offset).rem_euclid(len as isize) as usize
}

/// Periodic Moore neighbourhood of `idx`, self included.
///
/// Offsets run over `{-1, 0, 1}^3` in lexicographic order of the offset
/// triple, so the cell itself sits at [`SELF_SLOT`].
pub fn neighbors(idx: CellIndex, size: GridSize) -> [CellIndex; NEIGHBORHOOD_SIZE] {
    let mut out = [[0usize; 3]; NEIGHBORHOOD_SIZE];
    let mut slot = 0;

    for d0 in -1isize..=1 {
        for d1 in -1isize..=1 {
            for d2 in -1isize..=1 {
                out[slot] = [
                    wrap(idx[0], d0, size.0[0]),
                    wrap(idx[1], d1, size.0[1]),
                    wrap(idx[2], d2, size.0[2]),
                ];
                slot += 1;
            }
        }
    }

    out
}

/// Iterate every cell of the grid in linear-index order.
pub fn cells(size: GridSize) -> impl Iterator<Item = CellIndex> {
    (0..size.ncells()).map(move |linear| delinearize(linear, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linearize() {
        let size = GridSize::cubic(4);

        // First cell
        assert_eq!(linearize([0, 0, 0], size), 0);
        // Last cell
        assert_eq!(linearize([3, 3, 3], size), 63);
        // Last axis varies fastest
        assert_eq!(linearize([0, 0, 1], size), 1);
        assert_eq!(linearize([0, 1, 0], size), 4);
        assert_eq!(linearize([1, 0, 0], size), 16);
    }

    #[test]
    fn test_linearize_non_cubic() {
        let size = GridSize([2, 3, 5]);
        assert_eq!(linearize([1, 2, 4], size), 29);
        assert_eq!(size.ncells(), 30);
    }

    #[test]
    fn test_delinearize_inverts_linearize() {
        let size = GridSize([3, 4, 5]);
        for linear in 0..size.ncells() {
            assert_eq!(linearize(delinearize(linear, size), size), linear);
        }
    }

    #[test]
    fn test_cells_in_linear_order() {
        let size = GridSize([3, 2, 4]);
        let all: Vec<_> = cells(size).collect();
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], [0, 0, 0]);
        assert_eq!(all[1], [0, 0, 1]);
        assert_eq!(all[23], [2, 1, 3]);
    }

    #[test]
    fn test_neighbors_self_slot() {
        let size = GridSize::cubic(5);
        let n = neighbors([2, 3, 4], size);
        assert_eq!(n[SELF_SLOT], [2, 3, 4]);
        assert_eq!(n[0], [1, 2, 3]);
        assert_eq!(n[26], [3, 4, 0]);
    }

    #[test]
    fn test_neighbors_wrap_at_origin() {
        let size = GridSize::cubic(4);
        let n = neighbors([0, 0, 0], size);
        assert_eq!(n[0], [3, 3, 3]);
        assert_eq!(n[1], [3, 3, 0]);
        assert_eq!(n[2], [3, 3, 1]);
        assert_eq!(n[26], [1, 1, 1]);
    }

    #[test]
    fn test_neighbors_distinct_from_three() {
        for gs in 3..6 {
            let size = GridSize::cubic(gs);
            for cell in cells(size) {
                let mut linear: Vec<_> = neighbors(cell, size)
                    .iter()
                    .map(|&c| linearize(c, size))
                    .collect();
                linear.sort_unstable();
                linear.dedup();
                assert_eq!(linear.len(), NEIGHBORHOOD_SIZE, "gs = {}", gs);
            }
        }
    }

    #[test]
    fn test_neighbors_alias_below_three() {
        let size = GridSize::cubic(2);
        let mut linear: Vec<_> = neighbors([0, 0, 0], size)
            .iter()
            .map(|&c| linearize(c, size))
            .collect();
        linear.sort_unstable();
        linear.dedup();
        // Only the 8 cells of the 2x2x2 grid are reachable
        assert_eq!(linear.len(), 8);
    }

    #[test]
    fn test_validate_neighborhood() {
        assert!(GridSize::cubic(3).validate_neighborhood().is_ok());
        assert!(GridSize([3, 7, 4]).validate_neighborhood().is_ok());

        let err = GridSize::cubic(2).validate_neighborhood().unwrap_err();
        assert!(matches!(
            err,
            DiffusionError::Precondition { min: MIN_GRID_SIZE, .. }
        ));
        assert!(GridSize([5, 5, 1]).validate_neighborhood().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(GridSize([2, 3, 4]).to_string(), "2x3x4");
    }
}
