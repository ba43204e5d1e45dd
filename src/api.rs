//! High-level API for growing a Hessian alongside an active set
//!
//! [`ActiveSetSession`] owns the bordered Hessian, the active set and, for
//! the direct strategy, the label-weighted kernel matrix. Each call to
//! [`ActiveSetSession::admit`] appends vectors to the active set and grows
//! the Hessian to match.
//!
//! # Quick Start
//!
//! ```rust
//! use gramgrow::api::ActiveSetSession;
//! use gramgrow::core::{KernelFamily, UpdateConfig};
//! use gramgrow::data::TrainingData;
//! use gramgrow::matrix::Matrix;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let features = Matrix::from_rows(&[
//!     vec![0.0, 1.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//!     vec![0.5, 0.5],
//! ])?;
//! let data = TrainingData::new(features, vec![1.0, -1.0, 1.0, -1.0])?;
//! let config = UpdateConfig::default().with_kernel(KernelFamily::Rbf { gamma: 0.5 });
//!
//! let mut session = ActiveSetSession::new(&data, config)?;
//! let error_rows: Vec<usize> = (0..data.len()).collect();
//! session.admit(&[0, 2], &error_rows)?;
//! session.admit(&[3], &error_rows)?;
//!
//! assert_eq!(session.hessian().shape(), (4, 4));
//! # Ok(())
//! # }
//! ```

use crate::core::{GramError, Result, UpdateConfig, UpdateOutcome, UpdateStrategy};
use crate::data::TrainingData;
use crate::hessian::HessianUpdater;
use crate::matrix::Matrix;

/// Active set, Hessian and kernel matrix for one training run
#[derive(Debug)]
pub struct ActiveSetSession<'a> {
    data: &'a TrainingData,
    updater: HessianUpdater,
    hessian: Matrix,
    kernel_matrix: Option<Matrix>,
    active_set: Vec<usize>,
}

impl<'a> ActiveSetSession<'a> {
    /// Start with an empty active set
    ///
    /// The Hessian starts as the bias entry `C * n`, which is its value when
    /// every training row is an error row.
    pub fn new(data: &'a TrainingData, config: UpdateConfig) -> Result<Self> {
        if data.residency() != config.residency {
            return Err(GramError::ResidencyMismatch {
                expected: config.residency,
                actual: data.residency(),
            });
        }
        let residency = config.residency;
        let hessian = Matrix::filled(1, 1, config.c * data.len() as f64, residency);
        let kernel_matrix = match config.strategy {
            UpdateStrategy::Direct => Some(Matrix::zeros(0, 0, residency)),
            UpdateStrategy::Chunked => None,
        };
        let updater = HessianUpdater::new(config)?;

        log::info!(
            "Session over {} rows ({} features), {:?} strategy",
            data.len(),
            data.dim(),
            updater.config().strategy
        );
        Ok(Self {
            data,
            updater,
            hessian,
            kernel_matrix,
            active_set: Vec::new(),
        })
    }

    /// Replace the bias entry `H[0][0]`; only valid before the first admission
    pub fn with_bias_entry(mut self, value: f64) -> Result<Self> {
        if !self.active_set.is_empty() {
            return Err(GramError::DimensionInconsistency {
                current: self.active_set.len(),
                requested: 0,
            });
        }
        self.hessian.set(0, 0, value);
        Ok(self)
    }

    /// Append `new` to the active set and grow the Hessian over `error_rows`
    ///
    /// On error the active set is left as it was.
    pub fn admit(&mut self, new: &[usize], error_rows: &[usize]) -> Result<UpdateOutcome> {
        if let Some(&index) = new.iter().find(|&&i| i >= self.data.len()) {
            return Err(GramError::IndexOutOfBounds {
                index,
                len: self.data.len(),
            });
        }
        let mut seen = vec![false; self.data.len()];
        for &i in self.active_set.iter().chain(new) {
            if std::mem::replace(&mut seen[i], true) {
                return Err(GramError::InvalidParameter(format!(
                    "row {i} is already in the active set"
                )));
            }
        }

        let committed = self.active_set.len();
        self.active_set.extend_from_slice(new);
        let result = self.updater.update(
            &mut self.hessian,
            self.kernel_matrix.as_mut(),
            &self.data.inputs(&self.active_set, error_rows),
        );
        if result.is_err() {
            self.active_set.truncate(committed);
        }
        result
    }

    pub fn hessian(&self) -> &Matrix {
        &self.hessian
    }

    /// The label-weighted kernel matrix, present for the direct strategy
    pub fn kernel_matrix(&self) -> Option<&Matrix> {
        self.kernel_matrix.as_ref()
    }

    pub fn active_set(&self) -> &[usize] {
        &self.active_set
    }

    pub fn updater(&self) -> &HessianUpdater {
        &self.updater
    }

    pub fn data(&self) -> &TrainingData {
        self.data
    }
}
