//! Core type definitions for Hessian growth

use crate::core::{GramError, Result};
use serde::{Deserialize, Serialize};

/// Where a matrix lives. Fixed when the matrix is constructed or transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    #[default]
    Host,
    Device,
}

/// Kernel family and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KernelFamily {
    /// K(x, y) = x^T * y
    Linear,
    /// K(x, y) = (γ * <x, y> + coef)^degree
    Polynomial { degree: u32, gamma: f64, coef: f64 },
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: f64 },
    /// K(x, y) = tanh(γ * <x, y> + coef)
    Sigmoid { gamma: f64, coef: f64 },
}

impl Default for KernelFamily {
    fn default() -> Self {
        KernelFamily::Rbf { gamma: 1.0 }
    }
}

impl KernelFamily {
    /// Short identifier used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            KernelFamily::Linear => "linear",
            KernelFamily::Polynomial { .. } => "polynomial",
            KernelFamily::Rbf { .. } => "rbf",
            KernelFamily::Sigmoid { .. } => "sigmoid",
        }
    }

    /// Check the family's parameter ranges
    pub fn validate(&self) -> Result<()> {
        match *self {
            KernelFamily::Linear => Ok(()),
            KernelFamily::Polynomial { degree, gamma, .. } => {
                if degree == 0 {
                    return Err(GramError::InvalidParameter(
                        "Polynomial degree must be positive".to_string(),
                    ));
                }
                positive("gamma", gamma)
            }
            KernelFamily::Rbf { gamma } => positive("gamma", gamma),
            KernelFamily::Sigmoid { gamma, coef } => {
                positive("gamma", gamma)?;
                if !coef.is_finite() {
                    return Err(GramError::InvalidParameter(format!(
                        "coef must be finite, got {coef}"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GramError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// How the error/active rows' kernel values reach the new block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Stream the error rows in bounded chunks, evaluating kernels on the fly
    #[default]
    Chunked,
    /// Read the error rows' kernel values from the caller's kernel matrix
    Direct,
}

/// Configuration for one Hessian updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Kernel family and parameters
    pub kernel: KernelFamily,
    /// SVM box constant
    pub c: f64,
    /// Residency of every matrix touched by an update
    pub residency: Residency,
    /// Working-set size bounding one chunk of error rows
    pub set_size: usize,
    /// Chunked (streaming) or direct (kernel matrix) evaluation
    pub strategy: UpdateStrategy,
    /// Skip the scattered gather and always compact kernel-matrix columns in place
    pub always_contigify: bool,
    /// Largest scattered column copy, in elements, the direct strategy may allocate
    pub gather_budget: Option<usize>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            kernel: KernelFamily::default(),
            c: 1.0,
            residency: Residency::Host,
            set_size: 5000,
            strategy: UpdateStrategy::Chunked,
            always_contigify: false,
            gather_budget: None,
        }
    }
}

impl UpdateConfig {
    pub fn with_kernel(mut self, kernel: KernelFamily) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_residency(mut self, residency: Residency) -> Self {
        self.residency = residency;
        self
    }

    pub fn with_set_size(mut self, set_size: usize) -> Self {
        self.set_size = set_size;
        self
    }

    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_always_contigify(mut self, always_contigify: bool) -> Self {
        self.always_contigify = always_contigify;
        self
    }

    pub fn with_gather_budget(mut self, budget: Option<usize>) -> Self {
        self.gather_budget = budget;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        positive("C", self.c)?;
        if self.set_size == 0 {
            return Err(GramError::InvalidParameter(
                "set_size must be positive".to_string(),
            ));
        }
        self.kernel.validate()
    }
}

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Scatter into a dense row of length `dim`; indices past `dim` are dropped
    pub fn to_dense(&self, dim: usize) -> Vec<f64> {
        let mut dense = vec![0.0; dim];
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            if i < dim {
                dense[i] = v;
            }
        }
        dense
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Training sample with features and label
#[derive(Clone, Debug)]
pub struct Sample {
    pub features: SparseVector,
    /// Class label (+1 or -1)
    pub label: f64,
}

impl Sample {
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// How the direct strategy reached the error rows' kernel columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAccess {
    /// Scattered copy, kernel matrix untouched
    Gathered,
    /// Compacted in place and reverted before returning
    Contigified,
}

/// Summary of one growth event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Hessian dimension before the call (d0 + 1)
    pub previous_dim: usize,
    /// Hessian dimension after the call (d + 1)
    pub new_dim: usize,
    pub strategy: UpdateStrategy,
    /// Number of error-row chunks streamed (chunked strategy only)
    pub chunks: usize,
    /// Column access used (direct strategy only)
    pub access: Option<ColumnAccess>,
    /// Scalar added to the new diagonal sub-block
    pub regularization: f64,
}
