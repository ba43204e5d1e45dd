//! Data loading and dense training data
//!
//! [`LibSVMDataset`] reads sparse rows from disk. [`TrainingData`] densifies
//! any [`Dataset`] into the row-major feature matrix, squared norms and
//! labels that Hessian updates borrow.

pub mod libsvm;

pub use self::libsvm::*;

use crate::core::{Dataset, GramError, Residency, Result};
use crate::hessian::UpdateInputs;
use crate::matrix::Matrix;
use ndarray::{Array2, ArrayView1};

/// Dense features, squared row norms and ±1 labels
#[derive(Debug, Clone)]
pub struct TrainingData {
    features: Matrix,
    norms: Vec<f64>,
    labels: Vec<f64>,
}

impl TrainingData {
    /// Build from a feature matrix with one example per row
    pub fn new(features: Matrix, labels: Vec<f64>) -> Result<Self> {
        if labels.is_empty() {
            return Err(GramError::EmptyDataset);
        }
        if features.rows() != labels.len() {
            return Err(GramError::DimensionMismatch {
                expected: labels.len(),
                actual: features.rows(),
            });
        }
        if let Some(&bad) = labels.iter().find(|&&y| y != 1.0 && y != -1.0) {
            return Err(GramError::InvalidLabel(bad));
        }

        let norms = features
            .as_array()
            .outer_iter()
            .map(|row| row.dot(&row))
            .collect();
        Ok(Self {
            features,
            norms,
            labels,
        })
    }

    /// Densify a sparse dataset on the host
    pub fn from_dataset<D: Dataset>(dataset: &D) -> Result<Self> {
        if dataset.is_empty() {
            return Err(GramError::EmptyDataset);
        }
        let n = dataset.len();
        let dim = dataset.dim();
        let mut features = Array2::zeros((n, dim));
        let mut labels = Vec::with_capacity(n);
        for (i, mut row) in features.outer_iter_mut().enumerate() {
            let sample = dataset.get_sample(i);
            row.assign(&ArrayView1::from(sample.features.to_dense(dim).as_slice()));
            labels.push(sample.label);
        }
        log::debug!("Densified {} samples with {} features", n, dim);
        Self::new(Matrix::from_array(features, Residency::Host), labels)
    }

    /// Copy of this data with the feature matrix moved to `residency`
    pub fn in_residency(&self, residency: Residency) -> Self {
        Self {
            features: self.features.to_residency(residency),
            norms: self.norms.clone(),
            labels: self.labels.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of features per row
    pub fn dim(&self) -> usize {
        self.features.cols()
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn residency(&self) -> Residency {
        self.features.residency()
    }

    /// Borrow this data as update inputs for one growth event
    pub fn inputs<'a>(
        &'a self,
        active_set: &'a [usize],
        error_rows: &'a [usize],
    ) -> UpdateInputs<'a> {
        UpdateInputs {
            active_set,
            error_rows,
            labels: &self.labels,
            features: &self.features,
            norms: &self.norms,
        }
    }
}
