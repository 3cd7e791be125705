//! Codec facade: the uniform interface the pipeline sees over every lossy
//! and lossless kernel.
//!
//! A kernel compresses a typed buffer into an opaque byte blob and
//! reconstructs a buffer of the original element count from it. All
//! configuration goes through string parameters (`bits=24`, `level=3`);
//! each kernel documents its recognized keys and rejects the rest with
//! `BadParameter`. Kernels own their scratch space; callers own the
//! returned blobs.

use crate::error::Result;

/// 1-D shape descriptor passed through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub elem_bytes: usize,
    pub count: usize,
}

impl Layout {
    pub fn f32(count: usize) -> Self {
        Self {
            elem_bytes: 4,
            count,
        }
    }

    pub fn bytes(count: usize) -> Self {
        Self {
            elem_bytes: 1,
            count,
        }
    }

    /// Total raw payload size described by this layout.
    pub fn raw_len(&self) -> usize {
        self.elem_bytes * self.count
    }
}

pub trait Kernel {
    /// Registry name, stable across runs.
    fn name(&self) -> &'static str;

    /// Reset every parameter to its default. Idempotent.
    fn init(&mut self);

    /// Set a string parameter. Unknown keys and unparsable values fail with
    /// `BadParameter`.
    fn set_parameter(&mut self, key: &str, value: &str) -> Result<()>;

    /// Compress `raw` (which must be `layout.raw_len()` bytes) into an
    /// opaque blob.
    fn compress(&self, raw: &[u8], layout: &Layout) -> Result<Vec<u8>>;

    /// Reconstruct exactly `layout.count` elements from `compressed`.
    /// Lossless kernels are bit-exact; lossy kernels are within their
    /// configured precision.
    fn decompress(&self, compressed: &[u8], layout: &Layout) -> Result<Vec<u8>>;
}
