//! Residency-aware dense matrix
//!
//! Every matrix carries the [`Residency`] it was constructed in. Algorithms are
//! written once against this type; the placement decision is made when a
//! matrix is built or transferred, never inside the algorithm. Binary
//! operations between matrices of different residency are rejected.
//!
//! Storage is row-major `ndarray::Array2<f64>`.

use crate::core::{GramError, Residency, Result};
use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use std::fmt;
use std::ops::Range;

/// Dense `f64` matrix tagged with its residency
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Array2<f64>,
    residency: Residency,
}

/// Outcome of a scattered column gather
#[derive(Debug)]
pub enum Gather {
    Gathered(Matrix),
    /// The gather could not be expressed; nothing was allocated or moved
    Structural(GatherFailure),
}

/// Why a scattered gather could not be constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherFailure {
    ExceedsBudget { requested: usize, budget: usize },
}

impl fmt::Display for GatherFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatherFailure::ExceedsBudget { requested, budget } => write!(
                f,
                "scattered copy of {requested} elements exceeds budget of {budget}"
            ),
        }
    }
}

/// Swap log produced by [`Matrix::contigify`]; replaying it backwards is the inverse permutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "a contigified matrix must be reverted with its swap log"]
pub struct ColumnSwaps {
    swaps: Vec<(usize, usize)>,
    width: usize,
}

impl ColumnSwaps {
    /// Number of leading columns that were compacted
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of physical column swaps performed
    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }
}

impl Matrix {
    /// Create a `rows x cols` matrix filled with `value`
    pub fn filled(rows: usize, cols: usize, value: f64, residency: Residency) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            residency,
        }
    }

    pub fn zeros(rows: usize, cols: usize, residency: Residency) -> Self {
        Self::filled(rows, cols, 0.0, residency)
    }

    /// Wrap an existing array
    pub fn from_array(data: Array2<f64>, residency: Residency) -> Self {
        Self { data, residency }
    }

    /// Build a host matrix from equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(GramError::DimensionMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let data = Array2::from_shape_vec((rows.len(), cols), flat).map_err(|e| {
            GramError::InvalidParameter(format!("Cannot shape matrix rows: {e}"))
        })?;
        Ok(Self::from_array(data, Residency::Host))
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }

    /// # Panics
    /// Panics if the position is out of bounds
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    /// # Panics
    /// Panics if the position is out of bounds
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[[row, col]] = value;
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.data.row(row)
    }

    /// Sub-range view
    pub fn view(&self, rows: Range<usize>, cols: Range<usize>) -> ArrayView2<'_, f64> {
        self.data.slice(s![rows, cols])
    }

    pub fn view_mut(&mut self, rows: Range<usize>, cols: Range<usize>) -> ArrayViewMut2<'_, f64> {
        self.data.slice_mut(s![rows, cols])
    }

    /// Copy of the given rows, in index order
    ///
    /// # Panics
    /// Panics if an index is out of bounds
    pub fn gather_rows(&self, indices: &[usize]) -> Matrix {
        Matrix::from_array(self.data.select(Axis(0), indices), self.residency)
    }

    /// Copy of the given columns restricted to `rows`, in index order
    ///
    /// # Panics
    /// Panics if an index is out of bounds
    pub fn gather_columns(&self, rows: Range<usize>, indices: &[usize]) -> Matrix {
        let block = self.data.slice(s![rows, ..]).select(Axis(1), indices);
        Matrix::from_array(block, self.residency)
    }

    /// Scattered column gather that refuses copies larger than `budget` elements
    ///
    /// # Panics
    /// Panics if an index is out of bounds
    pub fn try_gather_columns(
        &self,
        rows: Range<usize>,
        indices: &[usize],
        budget: Option<usize>,
    ) -> Gather {
        let requested = rows.len().saturating_mul(indices.len());
        match budget {
            Some(budget) if requested > budget => {
                Gather::Structural(GatherFailure::ExceedsBudget { requested, budget })
            }
            _ => Gather::Gathered(self.gather_columns(rows, indices)),
        }
    }

    pub fn transpose(&self) -> Matrix {
        Matrix::from_array(self.data.t().to_owned(), self.residency)
    }

    /// Resize to `rows x cols`, keeping the overlapping top-left corner and zero filling the rest
    pub fn resize(&mut self, rows: usize, cols: usize) {
        if self.shape() == (rows, cols) {
            return;
        }
        let keep_rows = rows.min(self.rows());
        let keep_cols = cols.min(self.cols());
        let mut data = Array2::zeros((rows, cols));
        data.slice_mut(s![..keep_rows, ..keep_cols])
            .assign(&self.data.slice(s![..keep_rows, ..keep_cols]));
        self.data = data;
    }

    pub fn scale(&mut self, factor: f64) {
        self.data.mapv_inplace(|v| v * factor);
    }

    /// Add `value` to every element of the sub-range
    pub fn add_scalar(&mut self, rows: Range<usize>, cols: Range<usize>, value: f64) {
        self.data
            .slice_mut(s![rows, cols])
            .map_inplace(|v| *v += value);
    }

    /// Element-wise `self += other`
    ///
    /// # Panics
    /// Panics on a shape or residency mismatch
    pub fn add_assign(&mut self, other: &Matrix) {
        assert_eq!(
            self.residency, other.residency,
            "Cannot mix residencies in one operation"
        );
        assert_eq!(self.shape(), other.shape(), "Shape mismatch in add_assign");
        self.data += &other.data;
    }

    /// Transfer to another residency
    pub fn to_residency(&self, residency: Residency) -> Matrix {
        if residency != self.residency {
            log::trace!(
                "Transferring {}x{} matrix {:?} -> {:?}",
                self.rows(),
                self.cols(),
                self.residency,
                residency
            );
        }
        Matrix::from_array(self.data.clone(), residency)
    }

    /// Physically move `columns` (in order) to the leading columns
    ///
    /// Columns must be distinct and in range. The returned log restores the
    /// original layout through [`Matrix::revert`].
    pub fn contigify(&mut self, columns: &[usize]) -> Result<ColumnSwaps> {
        let n = self.cols();
        let mut seen = vec![false; n];
        for &c in columns {
            if c >= n {
                return Err(GramError::IndexOutOfBounds { index: c, len: n });
            }
            if seen[c] {
                return Err(GramError::InvalidParameter(format!(
                    "column {c} requested twice for compaction"
                )));
            }
            seen[c] = true;
        }

        // position[c] = where original column c currently sits, origin[p] = inverse
        let mut position: Vec<usize> = (0..n).collect();
        let mut origin: Vec<usize> = (0..n).collect();
        let mut swaps = Vec::new();

        for (target, &c) in columns.iter().enumerate() {
            let from = position[c];
            if from != target {
                self.swap_columns(target, from);
                let displaced = origin[target];
                origin.swap(target, from);
                position[c] = target;
                position[displaced] = from;
                swaps.push((target, from));
            }
        }

        Ok(ColumnSwaps {
            swaps,
            width: columns.len(),
        })
    }

    /// Undo a [`Matrix::contigify`]
    pub fn revert(&mut self, log: ColumnSwaps) {
        for &(a, b) in log.swaps.iter().rev() {
            self.swap_columns(a, b);
        }
    }

    fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for r in 0..self.rows() {
            self.data.swap([r, a], [r, b]);
        }
    }
}
