//! Error types for Gram/Hessian growth

use crate::core::Residency;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GramError {
    /// The caller's bookkeeping would produce a new block of non-positive size.
    #[error("Dimension inconsistency: Hessian covers {current} active vectors, active set has {requested}")]
    DimensionInconsistency { current: usize, requested: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index {index} out of bounds for {len} training rows")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid label: expected -1 or +1, got {0}")]
    InvalidLabel(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Residency mismatch: expected {expected:?}, got {actual:?}")]
    ResidencyMismatch {
        expected: Residency,
        actual: Residency,
    },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, GramError>;
