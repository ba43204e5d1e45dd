//! Incremental growth of the bordered Gram/Hessian matrix for kernel SVM
//!
//! When an active-set SVM solver admits new vectors, the bias-bordered
//! Hessian over the active set gains rows and columns. This crate computes
//! only the new block, either by streaming the error rows through a bounded
//! working set or by reading them from a label-weighted kernel matrix, and
//! splices it into the existing Hessian without disturbing the old entries.

pub mod api;
pub mod core;
pub mod data;
pub mod hessian;
pub mod kernel;
pub mod matrix;
pub mod persistence;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::ActiveSetSession;
pub use crate::core::error::GramError;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{LibSVMDataset, TrainingData};
pub use crate::hessian::{ChunkPlan, HessianUpdater, UpdateInputs};
pub use crate::kernel::{Kernel, KernelEvaluator};
pub use crate::matrix::Matrix;
pub use crate::persistence::GrowthReport;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
