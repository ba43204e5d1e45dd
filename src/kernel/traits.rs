//! Kernel trait definition

use ndarray::ArrayView1;

/// Kernel function trait
///
/// A kernel function K(x, y) evaluated on dense feature rows.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64;

    /// Compute kernel value using precomputed squared norms
    ///
    /// Kernels that depend on distances (e.g., RBF) override this to skip
    /// recomputing the norms of each row.
    fn compute_with_norms(
        &self,
        x: ArrayView1<'_, f64>,
        y: ArrayView1<'_, f64>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
