//! Utility functions for Hessian growth

use crate::matrix::Matrix;
use ndarray::ArrayView2;

/// Diagnostics over grown Hessians
pub mod diagnostics {
    use super::*;

    /// Largest `|m[i][j] - m[j][i]|`; zero for a symmetric matrix
    ///
    /// # Panics
    /// Panics if `m` is not square.
    pub fn max_asymmetry(m: &Matrix) -> f64 {
        assert!(m.is_square(), "Symmetry is only defined for square matrices");
        let a = m.as_array();
        let n = a.nrows();
        let mut worst = 0.0_f64;
        for i in 0..n {
            for j in i + 1..n {
                worst = worst.max((a[[i, j]] - a[[j, i]]).abs());
            }
        }
        worst
    }

    /// Largest `|a - b| / max(|a|, |b|)` over matching entries; zero where both are zero
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn max_relative_difference(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> f64 {
        assert_eq!(a.dim(), b.dim(), "Shapes must match");
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let scale = x.abs().max(y.abs());
                if scale == 0.0 {
                    0.0
                } else {
                    (x - y).abs() / scale
                }
            })
            .fold(0.0, f64::max)
    }

    /// Whether `before` survives bit for bit as the leading block of `after`
    pub fn leading_block_identical(before: &Matrix, after: &Matrix) -> bool {
        let (rows, cols) = before.shape();
        if after.rows() < rows || after.cols() < cols {
            return false;
        }
        after
            .view(0..rows, 0..cols)
            .iter()
            .zip(before.as_array().iter())
            .all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

/// Validation and preprocessing utilities
pub mod validation {
    /// Count positive and negative labels and their ratio
    pub fn check_label_balance(labels: &[f64]) -> (usize, usize, f64) {
        let positive_count = labels.iter().filter(|&&l| l > 0.0).count();
        let negative_count = labels.len() - positive_count;
        let balance_ratio = if negative_count == 0 {
            f64::INFINITY
        } else {
            positive_count as f64 / negative_count as f64
        };
        (positive_count, negative_count, balance_ratio)
    }
}

/// Memory management utilities
pub mod memory {
    const F64_BYTES: usize = std::mem::size_of::<f64>();

    /// Bytes held while streaming one chunk of error rows into a Hessian of
    /// dimension `dim`: the label-weighted kernel scratch plus the gathered
    /// feature rows
    pub fn estimate_chunk_memory(dim: usize, n_features: usize, set_size: usize) -> usize {
        set_size * (dim + n_features) * F64_BYTES
    }

    /// Largest working-set size whose chunk fits in half of `available_memory_mb`
    pub fn recommend_set_size(dim: usize, n_features: usize, available_memory_mb: usize) -> usize {
        let available_bytes = available_memory_mb * 1024 * 1024;
        let per_row = (dim + n_features).max(1) * F64_BYTES;
        (available_bytes / 2 / per_row).max(1)
    }
}
