//! Append-only growth of the bordered Gram/Hessian matrix
//!
//! Given `H` for the first `d0` active vectors, [`HessianUpdater::update`]
//! computes the block of columns for the newly admitted vectors
//! `S[d0..d]` and splices it into `H` together with its transpose. Column
//! `j` of the new block holds
//!
//! ```text
//! B[0][j]     = C * Σ_c a_c[0] * a_c[d0+1+j]
//! B[1+i][j]   = k(S_i, S_{d0+j}) + C * Σ_c a_c[1+i] * a_c[d0+1+j]
//! a_c         = y_c * [1, k(S_0, x_c), ..., k(S_{d-1}, x_c)]
//! ```
//!
//! where `c` runs over the error rows. The `a_c` columns are either streamed
//! chunk by chunk ([`UpdateStrategy::Chunked`]) or read from the caller's
//! kernel matrix ([`UpdateStrategy::Direct`]).

use crate::core::{
    ColumnAccess, GramError, Residency, Result, UpdateConfig, UpdateOutcome, UpdateStrategy,
};
use crate::hessian::chunk::ChunkPlan;
use crate::hessian::contig::acquire_columns;
use crate::kernel::KernelEvaluator;
use crate::matrix::Matrix;
use ndarray::{s, Array2, ArrayView2};

/// Scale of the new-block diagonal mean added back onto the new diagonal sub-block
pub const REGULARIZATION_FACTOR: f64 = 1e-10;

/// Borrowed per-call inputs owned by the training loop
#[derive(Debug, Clone, Copy)]
pub struct UpdateInputs<'a> {
    /// Active set after admission; the first `rows(H) - 1` entries are already in `H`
    pub active_set: &'a [usize],
    /// Error/active rows contributing to the new block
    pub error_rows: &'a [usize],
    /// Labels (+1/-1), one per training row
    pub labels: &'a [f64],
    /// Feature rows, one per training row
    pub features: &'a Matrix,
    /// Squared norms of the feature rows
    pub norms: &'a [f64],
}

/// Grows Hessians for one training run
#[derive(Debug)]
pub struct HessianUpdater {
    config: UpdateConfig,
    evaluator: KernelEvaluator,
    contigify_latched: bool,
}

impl HessianUpdater {
    pub fn new(config: UpdateConfig) -> Result<Self> {
        config.validate()?;
        let evaluator = KernelEvaluator::new(config.kernel)?;
        Ok(Self {
            config,
            evaluator,
            contigify_latched: false,
        })
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// True once a scattered gather has failed; later direct updates compact in place straight away
    pub fn contigify_latched(&self) -> bool {
        self.contigify_latched
    }

    /// Extend `hessian` from `d0 + 1` to `d + 1` rows and columns
    ///
    /// `kernel_matrix` is required by the direct strategy and ignored by the
    /// chunked one. Every validation error is reported before `hessian` is
    /// touched.
    pub fn update(
        &mut self,
        hessian: &mut Matrix,
        kernel_matrix: Option<&mut Matrix>,
        inputs: &UpdateInputs<'_>,
    ) -> Result<UpdateOutcome> {
        let d0 = self.validate(hessian, inputs)?;
        let d = inputs.active_set.len();

        log::debug!(
            "Growing {} Hessian {} -> {} with {} error rows ({:?})",
            self.config.kernel.name(),
            d0 + 1,
            d + 1,
            inputs.error_rows.len(),
            self.config.strategy
        );

        let mut block = Matrix::zeros(d + 1, d - d0, self.config.residency);
        let (chunks, access) = match self.config.strategy {
            UpdateStrategy::Chunked => (self.chunked_block(&mut block, d0, inputs), None),
            UpdateStrategy::Direct => {
                let kernel_matrix = kernel_matrix.ok_or_else(|| {
                    GramError::InvalidParameter(
                        "direct strategy requires a kernel matrix".to_string(),
                    )
                })?;
                let access = self.direct_block(&mut block, d0, kernel_matrix, inputs)?;
                (0, Some(access))
            }
        };

        let regularization = splice(hessian, &block, d0);

        Ok(UpdateOutcome {
            previous_dim: d0 + 1,
            new_dim: d + 1,
            strategy: self.config.strategy,
            chunks,
            access,
            regularization,
        })
    }

    /// Fill the kernel-matrix rows for active vectors it does not cover yet
    ///
    /// Row 0 holds the labels, row `r` holds `y_p * k(S_{r-1}, x_p)`. Existing
    /// rows are left alone. Returns the number of rows written.
    pub fn extend_kernel_rows(
        &self,
        kernel_matrix: &mut Matrix,
        inputs: &UpdateInputs<'_>,
    ) -> Result<usize> {
        let n = inputs.labels.len();
        let d = inputs.active_set.len();
        check_residency(self.config.residency, kernel_matrix)?;
        if inputs.features.rows() != n || inputs.norms.len() != n {
            return Err(GramError::DimensionMismatch {
                expected: n,
                actual: inputs.features.rows().min(inputs.norms.len()),
            });
        }
        if let Some(&index) = inputs.active_set.iter().find(|&&i| i >= n) {
            return Err(GramError::IndexOutOfBounds { index, len: n });
        }

        let mut written = 0;
        if kernel_matrix.rows() == 0 {
            kernel_matrix.resize(1, n);
            kernel_matrix
                .as_array_mut()
                .row_mut(0)
                .assign(&ndarray::ArrayView1::from(inputs.labels));
            written += 1;
        } else if kernel_matrix.cols() != n {
            return Err(GramError::DimensionMismatch {
                expected: n,
                actual: kernel_matrix.cols(),
            });
        }

        let have = kernel_matrix.rows();
        if have > d {
            return Ok(written);
        }

        let missing = &inputs.active_set[have - 1..];
        let rows = inputs.features.gather_rows(missing);
        let row_norms: Vec<f64> = missing.iter().map(|&i| inputs.norms[i]).collect();

        kernel_matrix.resize(d + 1, n);
        let mut fresh = kernel_matrix.view_mut(have..d + 1, 0..n);
        self.evaluator.pairwise_into(
            rows.as_array().view(),
            &row_norms,
            inputs.features.as_array().view(),
            inputs.norms,
            fresh.view_mut(),
        );
        for (mut column, &label) in fresh.columns_mut().into_iter().zip(inputs.labels) {
            column *= label;
        }

        log::trace!("Extended kernel matrix rows {}..={}", have, d);
        Ok(written + missing.len())
    }

    /// Returns `d0`
    fn validate(&self, hessian: &Matrix, inputs: &UpdateInputs<'_>) -> Result<usize> {
        if hessian.rows() == 0 || !hessian.is_square() {
            return Err(GramError::DimensionMismatch {
                expected: hessian.rows().max(1),
                actual: hessian.cols(),
            });
        }
        let d0 = hessian.rows() - 1;
        let d = inputs.active_set.len();
        if d0 + 2 > d + 1 {
            return Err(GramError::DimensionInconsistency {
                current: d0,
                requested: d,
            });
        }

        let n = inputs.labels.len();
        if inputs.features.rows() != n {
            return Err(GramError::DimensionMismatch {
                expected: n,
                actual: inputs.features.rows(),
            });
        }
        if inputs.norms.len() != n {
            return Err(GramError::DimensionMismatch {
                expected: n,
                actual: inputs.norms.len(),
            });
        }

        for &index in inputs.active_set.iter().chain(inputs.error_rows) {
            if index >= n {
                return Err(GramError::IndexOutOfBounds { index, len: n });
            }
            let label = inputs.labels[index];
            if label != 1.0 && label != -1.0 {
                return Err(GramError::InvalidLabel(label));
            }
        }

        check_residency(self.config.residency, hessian)?;
        check_residency(self.config.residency, inputs.features)?;

        // Only in-place compaction needs distinct columns; a scattered gather serves repeats
        if self.config.strategy == UpdateStrategy::Direct
            && self.compacts(d, inputs.error_rows.len())
        {
            let mut seen = vec![false; n];
            for &index in inputs.error_rows {
                if std::mem::replace(&mut seen[index], true) {
                    return Err(GramError::InvalidParameter(format!(
                        "error row {index} listed twice"
                    )));
                }
            }
        }

        Ok(d0)
    }

    /// True when the direct strategy will compact kernel columns in place for `nerv` error rows
    fn compacts(&self, d: usize, nerv: usize) -> bool {
        self.config.always_contigify
            || self.contigify_latched
            || self
                .config
                .gather_budget
                .is_some_and(|budget| (d + 1).saturating_mul(nerv) > budget)
    }

    /// Stream the error rows chunk by chunk; returns the number of chunks
    fn chunked_block(&self, block: &mut Matrix, d0: usize, inputs: &UpdateInputs<'_>) -> usize {
        let d = inputs.active_set.len();
        let sub_k = d - d0;
        let active = inputs.features.gather_rows(inputs.active_set);
        let active_norms: Vec<f64> = inputs
            .active_set
            .iter()
            .map(|&i| inputs.norms[i])
            .collect();
        let active = active.as_array().view();

        let new_active = active.slice(s![d0.., ..]);
        let mut kernel_part = block.as_array_mut().slice_mut(s![1.., ..]);
        self.evaluator.pairwise_into(
            active.slice(s![..d0, ..]),
            &active_norms[..d0],
            new_active,
            &active_norms[d0..],
            kernel_part.slice_mut(s![..d0, ..]),
        );
        self.evaluator.symmetric_into(
            new_active,
            &active_norms[d0..],
            kernel_part.slice_mut(s![d0.., ..]),
        );

        let plan = ChunkPlan::new(inputs.error_rows.len(), self.config.set_size);
        let mut scratch = Matrix::zeros(d + 1, plan.max_chunk_len(), self.config.residency);
        let mut sum = Array2::<f64>::zeros((d + 1, sub_k));

        for range in plan.ranges() {
            let rows = &inputs.error_rows[range];
            log::trace!("Chunk of {} error rows", rows.len());

            let chunk = inputs.features.gather_rows(rows);
            let chunk_norms: Vec<f64> = rows.iter().map(|&i| inputs.norms[i]).collect();

            let scratch = scratch.as_array_mut();
            let mut kc = scratch.slice_mut(s![.., ..rows.len()]);
            for (slot, &row) in kc.row_mut(0).iter_mut().zip(rows) {
                *slot = inputs.labels[row];
            }
            self.evaluator.pairwise_into(
                active,
                &active_norms,
                chunk.as_array().view(),
                &chunk_norms,
                kc.slice_mut(s![1.., ..]),
            );
            for (mut column, &row) in kc
                .slice_mut(s![1.., ..])
                .columns_mut()
                .into_iter()
                .zip(rows)
            {
                column *= inputs.labels[row];
            }

            accumulate_error_sum(kc.view(), d0, &mut sum);
        }

        fold_error_sum(block, sum, self.config.c);
        plan.len()
    }

    fn direct_block(
        &mut self,
        block: &mut Matrix,
        d0: usize,
        kernel_matrix: &mut Matrix,
        inputs: &UpdateInputs<'_>,
    ) -> Result<ColumnAccess> {
        let d = inputs.active_set.len();
        let sub_k = d - d0;
        self.extend_kernel_rows(kernel_matrix, inputs)?;

        // Rows d0+1..=d of K at the active columns, label weighting undone.
        // The new diagonal sub-block reads its upper triangle and mirrors it.
        let new_rows = kernel_matrix.gather_columns(d0 + 1..d + 1, inputs.active_set);
        {
            let mut cross = block.as_array_mut().slice_mut(s![1.., ..]);
            for j in 0..sub_k {
                for i in 0..=d0 + j {
                    let value = new_rows.get(j, i) * inputs.labels[inputs.active_set[i]];
                    cross[[i, j]] = value;
                    if i >= d0 {
                        cross[[d0 + j, i - d0]] = value;
                    }
                }
            }
        }

        let columns = acquire_columns(
            kernel_matrix,
            d + 1,
            inputs.error_rows,
            self.config.always_contigify || self.contigify_latched,
            self.config.gather_budget,
        )?;
        if let Some(failure) = columns.fallback() {
            if !self.contigify_latched {
                log::warn!(
                    "Scattered kernel gather unavailable ({failure}); compacting kernel columns in place from now on"
                );
                self.contigify_latched = true;
            }
        }

        let mut sum = Array2::<f64>::zeros((d + 1, sub_k));
        if !inputs.error_rows.is_empty() {
            accumulate_error_sum(columns.block(), d0, &mut sum);
        }
        let access = columns.access();
        drop(columns);

        fold_error_sum(block, sum, self.config.c);
        Ok(access)
    }
}

fn check_residency(expected: Residency, matrix: &Matrix) -> Result<()> {
    if matrix.residency() == expected {
        Ok(())
    } else {
        Err(GramError::ResidencyMismatch {
            expected,
            actual: matrix.residency(),
        })
    }
}

/// `sum += kc[.., new] · kc[new, ..]ᵀ` for one block of `a_c` columns
///
/// Rows `0..=d0` against the new rows go through a general product. The new
/// diagonal sub-block is accumulated on its upper triangle and mirrored.
fn accumulate_error_sum(kc: ArrayView2<'_, f64>, d0: usize, sum: &mut Array2<f64>) {
    let new_rows = kc.slice(s![d0 + 1.., ..]);
    KernelEvaluator::contract_into(
        kc.slice(s![..d0 + 1, ..]),
        new_rows,
        &mut sum.slice_mut(s![..d0 + 1, ..]),
    );
    KernelEvaluator::contract_symmetric_into(new_rows, &mut sum.slice_mut(s![d0 + 1.., ..]));
}

/// `block += C * sum`
fn fold_error_sum(block: &mut Matrix, mut sum: Array2<f64>, c: f64) {
    sum *= c;
    *block.as_array_mut() += &sum;
}

/// Write `block` and its transpose into `hessian`; returns the regularization added
fn splice(hessian: &mut Matrix, block: &Matrix, d0: usize) -> f64 {
    let old = d0 + 1;
    let sub_k = block.cols();
    let dim = old + sub_k;
    let block = block.as_array();

    let diagonal: f64 = (0..sub_k).map(|j| block[[old + j, j]]).sum();
    let regularization = diagonal / sub_k as f64 * REGULARIZATION_FACTOR;

    hessian.resize(dim, dim);
    hessian.view_mut(0..dim, old..dim).assign(block);
    hessian
        .view_mut(old..dim, 0..old)
        .assign(&block.slice(s![..old, ..]).t());
    hessian.add_scalar(old..dim, old..dim, regularization);

    regularization
}
