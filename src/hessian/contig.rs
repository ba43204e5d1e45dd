//! Access to scattered kernel-matrix columns
//!
//! The direct strategy needs the error rows' columns of the kernel matrix as
//! one dense block. A scattered copy is tried first. When the copy cannot be
//! constructed, or policy forbids it, the columns are compacted in place into
//! the leading block of the kernel matrix and a guard restores the original
//! column order when it is dropped, on every exit path.
//!
//! The guard holds the only mutable borrow of the kernel matrix, so nothing
//! else can observe the reordered layout.

use crate::core::{ColumnAccess, GramError, Result};
use crate::matrix::{ColumnSwaps, Gather, GatherFailure, Matrix};
use ndarray::ArrayView2;

/// Kernel-matrix columns compacted in place; reverted on drop
pub struct ContiguousColumns<'a> {
    matrix: &'a mut Matrix,
    rows: usize,
    swaps: Option<ColumnSwaps>,
}

impl<'a> ContiguousColumns<'a> {
    fn acquire(matrix: &'a mut Matrix, rows: usize, columns: &[usize]) -> Result<Self> {
        let swaps = matrix.contigify(columns)?;
        log::trace!(
            "Contigified {} kernel columns with {} swaps",
            swaps.width(),
            swaps.len()
        );
        Ok(Self {
            matrix,
            rows,
            swaps: Some(swaps),
        })
    }

    /// The `rows x columns.len()` leading block
    pub fn block(&self) -> ArrayView2<'_, f64> {
        let width = self.swaps.as_ref().map_or(0, ColumnSwaps::width);
        self.matrix.view(0..self.rows, 0..width)
    }
}

impl Drop for ContiguousColumns<'_> {
    fn drop(&mut self) {
        if let Some(swaps) = self.swaps.take() {
            self.matrix.revert(swaps);
        }
    }
}

/// The error rows' kernel columns, however they were reached
pub enum ActiveColumns<'a> {
    Gathered(Matrix),
    Contiguous {
        columns: ContiguousColumns<'a>,
        /// Set when a scattered gather was attempted and failed
        fallback: Option<GatherFailure>,
    },
}

impl ActiveColumns<'_> {
    pub fn block(&self) -> ArrayView2<'_, f64> {
        match self {
            ActiveColumns::Gathered(m) => m.as_array().view(),
            ActiveColumns::Contiguous { columns, .. } => columns.block(),
        }
    }

    pub fn access(&self) -> ColumnAccess {
        match self {
            ActiveColumns::Gathered(_) => ColumnAccess::Gathered,
            ActiveColumns::Contiguous { .. } => ColumnAccess::Contigified,
        }
    }

    /// The structural failure that forced compaction, if any
    pub fn fallback(&self) -> Option<GatherFailure> {
        match self {
            ActiveColumns::Contiguous { fallback, .. } => *fallback,
            ActiveColumns::Gathered(_) => None,
        }
    }
}

/// Reach `columns` of the leading `rows` rows of `matrix` as one dense block
///
/// Columns must be distinct and in range when compaction is used.
pub fn acquire_columns<'a>(
    matrix: &'a mut Matrix,
    rows: usize,
    columns: &[usize],
    always_contigify: bool,
    budget: Option<usize>,
) -> Result<ActiveColumns<'a>> {
    if rows > matrix.rows() {
        return Err(GramError::DimensionMismatch {
            expected: rows,
            actual: matrix.rows(),
        });
    }
    if let Some(&bad) = columns.iter().find(|&&c| c >= matrix.cols()) {
        return Err(GramError::IndexOutOfBounds {
            index: bad,
            len: matrix.cols(),
        });
    }

    let fallback = if always_contigify {
        None
    } else {
        match matrix.try_gather_columns(0..rows, columns, budget) {
            Gather::Gathered(block) => return Ok(ActiveColumns::Gathered(block)),
            Gather::Structural(failure) => {
                log::debug!("Scattered kernel gather failed ({failure}), compacting in place");
                Some(failure)
            }
        }
    };

    Ok(ActiveColumns::Contiguous {
        columns: ContiguousColumns::acquire(matrix, rows, columns)?,
        fallback,
    })
}
