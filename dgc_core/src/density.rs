//! Loader for the precomputed per-cell mass-density field.
//!
//! Each input chunk is a raw little-endian sequence of f32 cell densities,
//! no header. The rank's chunks are concatenated in list order into one
//! contiguous slab; cell indexing over the slab is row-major (i, j, k) with
//! stride (1, N, N²) for N cells per axis.

use std::fs::File;
use std::io::Read;

use tracing::debug;

use crate::config::DensityInput;
use crate::error::{DgcError, Result};

#[derive(Debug, Clone)]
pub struct DensityField {
    values: Vec<f32>,
}

impl DensityField {
    /// Read the rank-local density slab from the assigned chunk files.
    pub fn load(inputs: &[DensityInput]) -> Result<Self> {
        let total: u64 = inputs.iter().map(|f| f.count).sum();
        let mut values = Vec::with_capacity(total as usize);

        for input in inputs {
            debug!(file = %input.data.display(), cells = input.count, "reading density chunk");
            let mut file = File::open(&input.data)?;
            let mut payload = vec![0u8; input.count as usize * 4];
            file.read_exact(&mut payload)?;
            values.extend(
                payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().unwrap())),
            );
        }

        Ok(Self { values })
    }

    pub fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// `local_rho_count`: number of cells held by this rank.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rank-local density extrema.
    pub fn local_min_max(&self) -> Result<(f32, f32)> {
        if self.values.is_empty() {
            return Err(DgcError::Invariant("density field is empty".into()));
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
        }
        Ok((min, max))
    }

    /// Release the slab once bucketing no longer needs it.
    pub fn clear(&mut self) {
        self.values = Vec::new();
    }
}
