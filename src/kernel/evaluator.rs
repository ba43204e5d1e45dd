//! Row-set kernel evaluation
//!
//! [`KernelEvaluator`] turns a [`KernelFamily`] into pairwise kernel blocks
//! between two sets of feature rows, and provides the linear contraction used
//! to fold error-row kernel columns into the Hessian border.

use crate::core::{KernelFamily, Result};
use crate::kernel::{Kernel, LinearKernel, PolynomialKernel, RBFKernel, SigmoidKernel};
use crate::matrix::Matrix;
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

/// Evaluates a configured kernel family over row sets
pub struct KernelEvaluator {
    family: KernelFamily,
    kernel: Box<dyn Kernel>,
}

impl std::fmt::Debug for KernelEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelEvaluator")
            .field("family", &self.family)
            .finish()
    }
}

impl KernelEvaluator {
    pub fn new(family: KernelFamily) -> Result<Self> {
        family.validate()?;
        let kernel: Box<dyn Kernel> = match family {
            KernelFamily::Linear => Box::new(LinearKernel::new()),
            KernelFamily::Polynomial {
                degree,
                gamma,
                coef,
            } => Box::new(PolynomialKernel::new(degree, gamma, coef)),
            KernelFamily::Rbf { gamma } => Box::new(RBFKernel::new(gamma)),
            KernelFamily::Sigmoid { gamma, coef } => Box::new(SigmoidKernel::new(gamma, coef)),
        };
        Ok(Self { family, kernel })
    }

    pub fn family(&self) -> KernelFamily {
        self.family
    }

    /// `out[i][j] = K(a_i, b_j)` for rows `a_i` of `a` and `b_j` of `b`
    ///
    /// # Panics
    /// Panics if `out` is not `a.nrows() x b.nrows()` or a norm slice is short.
    pub fn pairwise_into(
        &self,
        a: ArrayView2<'_, f64>,
        a_norms: &[f64],
        b: ArrayView2<'_, f64>,
        b_norms: &[f64],
        mut out: ArrayViewMut2<'_, f64>,
    ) {
        assert_eq!(
            out.dim(),
            (a.nrows(), b.nrows()),
            "Kernel output block has wrong shape"
        );
        for (i, a_row) in a.outer_iter().enumerate() {
            for (j, b_row) in b.outer_iter().enumerate() {
                out[[i, j]] =
                    self.kernel
                        .compute_with_norms(a_row, b_row, a_norms[i], b_norms[j]);
            }
        }
    }

    /// `out[i][j] = out[j][i] = K(a_i, a_j)`, each pair evaluated once
    ///
    /// # Panics
    /// Panics if `out` is not `a.nrows() x a.nrows()` or `a_norms` is short.
    pub fn symmetric_into(
        &self,
        a: ArrayView2<'_, f64>,
        a_norms: &[f64],
        mut out: ArrayViewMut2<'_, f64>,
    ) {
        let n = a.nrows();
        assert_eq!(out.dim(), (n, n), "Kernel output block has wrong shape");
        for i in 0..n {
            for j in i..n {
                let value =
                    self.kernel
                        .compute_with_norms(a.row(i), a.row(j), a_norms[i], a_norms[j]);
                out[[i, j]] = value;
                out[[j, i]] = value;
            }
        }
    }

    /// Allocating variant of [`KernelEvaluator::pairwise_into`]; the result
    /// lives where `a` lives.
    pub fn pairwise(&self, a: &Matrix, a_norms: &[f64], b: &Matrix, b_norms: &[f64]) -> Matrix {
        assert_eq!(
            a.residency(),
            b.residency(),
            "Cannot mix residencies in one operation"
        );
        let mut out = Matrix::zeros(a.rows(), b.rows(), a.residency());
        self.pairwise_into(
            a.as_array().view(),
            a_norms,
            b.as_array().view(),
            b_norms,
            out.as_array_mut().view_mut(),
        );
        out
    }

    /// `out += a · bᵀ`: the linear kernel between the rows of two
    /// already kernel-transformed blocks
    ///
    /// # Panics
    /// Panics if `a` and `b` disagree on column count or `out` has the wrong shape.
    pub fn contract_into(
        a: ArrayView2<'_, f64>,
        b: ArrayView2<'_, f64>,
        out: &mut ArrayViewMut2<'_, f64>,
    ) {
        general_mat_mul(1.0, &a, &b.t(), 1.0, out);
    }

    /// `out += a · aᵀ` for a symmetric `out`; the upper triangle is
    /// accumulated and copied below the diagonal
    ///
    /// # Panics
    /// Panics if `out` is not `a.nrows() x a.nrows()`.
    pub fn contract_symmetric_into(a: ArrayView2<'_, f64>, out: &mut ArrayViewMut2<'_, f64>) {
        let n = a.nrows();
        assert_eq!(out.dim(), (n, n), "Contraction output block has wrong shape");
        for i in 0..n {
            for j in i..n {
                let value = out[[i, j]] + a.row(i).dot(&a.row(j));
                out[[i, j]] = value;
                out[[j, i]] = value;
            }
        }
    }
}
