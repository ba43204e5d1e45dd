//! Incremental Gram/Hessian growth
//!
//! - [`chunk`]: partitions the error rows into memory-bounded chunks
//! - [`contig`]: reaches scattered kernel-matrix columns, compacting in place when needed
//! - [`update`]: the update engine splicing new blocks into the bordered Hessian

pub mod chunk;
pub mod contig;
pub mod update;

pub use self::chunk::*;
pub use self::contig::*;
pub use self::update::*;
