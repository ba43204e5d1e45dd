//! Chunk planning for streamed error-row evaluation
//!
//! The error rows are split into contiguous, non-overlapping chunks so that
//! one chunk's kernel block bounds peak scratch memory. Small error sets are
//! still split into up to ten chunks; large ones into `ceil(nerv / set_size)`.
//! The last chunk absorbs the remainder of the integer division.

use std::ops::Range;

/// Upper bound on chunks for error sets that fit in one working set
pub const MAX_SMALL_CHUNKS: usize = 10;

/// Contiguous partition of `0..total` error rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    num_chunks: usize,
    chunk_len: usize,
}

impl ChunkPlan {
    /// # Panics
    /// Panics if `set_size` is zero
    pub fn new(total: usize, set_size: usize) -> Self {
        assert!(set_size > 0, "set_size must be positive");
        let num_chunks = if total > set_size {
            total.div_ceil(set_size)
        } else {
            total.min(MAX_SMALL_CHUNKS)
        };
        let chunk_len = if num_chunks == 0 {
            0
        } else {
            total / num_chunks
        };
        Self {
            total,
            num_chunks,
            chunk_len,
        }
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.num_chunks
    }

    pub fn is_empty(&self) -> bool {
        self.num_chunks == 0
    }

    /// Rows in the largest chunk (the last one), used to size scratch buffers
    pub fn max_chunk_len(&self) -> usize {
        if self.num_chunks == 0 {
            0
        } else {
            self.total - self.chunk_len * (self.num_chunks - 1)
        }
    }

    /// Index ranges into the error-row list, in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_chunks).map(move |i| {
            let start = i * self.chunk_len;
            let end = if i + 1 == self.num_chunks {
                self.total
            } else {
                start + self.chunk_len
            };
            start..end
        })
    }
}
