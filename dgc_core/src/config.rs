//! Typed view of the JSON run descriptor.
//!
//! The config is created once at the application boundary, validated before
//! any data I/O, and passed down read-only. The schema:
//!
//! ```json
//! {
//!   "hacc":    { "input": "...", "output": "..." },
//!   "density": {
//!      "inputs":  [ { "data": "...", "count": 512 }, ... ],
//!      "extents": { "min": 0, "max": 7 }
//!   },
//!   "bins":    { "count": 4, "adaptive": false,
//!                "min_bits": 16, "max_bits": 24 },
//!   "plots":   { "density": "density", "buckets": "buckets" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DgcError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub hacc: HaccSection,
    pub density: DensitySection,
    pub bins: BinsSection,
    pub plots: PlotsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HaccSection {
    /// Input particle snapshot.
    pub input: PathBuf,
    /// Decompressed output snapshot.
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DensitySection {
    /// Raw density chunks, dispatched contiguously across ranks.
    pub inputs: Vec<DensityInput>,
    /// Per-axis cell range endpoints of the uniform grid.
    pub extents: GridExtents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DensityInput {
    /// Raw little-endian f32 file, no header.
    pub data: PathBuf,
    /// Number of cells stored in the file.
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GridExtents {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinsSection {
    /// Number of density bins. Recomputed by the Prins rule in adaptive mode.
    pub count: usize,
    /// Equiprobable quantile bins instead of fixed-width bins.
    pub adaptive: bool,
    pub min_bits: u32,
    pub max_bits: u32,
    /// Which hand-tuned step table assigns bits in non-adaptive mode (1 or 2).
    #[serde(default = "default_bit_mode")]
    pub bit_mode: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotsSection {
    /// Stem of the density histogram plot file (".dat" is appended).
    pub density: String,
    /// Stem of the bucket distribution plot file.
    pub buckets: String,
}

fn default_bit_mode() -> u8 {
    2
}

impl RunConfig {
    /// Parse and validate a run descriptor from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the numerical preconditions the rest of the pipeline assumes.
    pub fn validate(&self) -> Result<()> {
        if self.cells_per_axis() == 0 {
            return Err(DgcError::ConfigInvalid(format!(
                "density extents [{}, {}] yield no cells",
                self.density.extents.min, self.density.extents.max
            )));
        }
        if self.density.inputs.is_empty() {
            return Err(DgcError::ConfigInvalid(
                "density input list is empty".into(),
            ));
        }
        if let Some(bad) = self.density.inputs.iter().find(|f| f.count == 0) {
            return Err(DgcError::ConfigInvalid(format!(
                "density file '{}' declares zero cells",
                bad.data.display()
            )));
        }
        if self.bins.count == 0 {
            return Err(DgcError::ConfigInvalid("bin count must be positive".into()));
        }
        if self.bins.min_bits == 0 {
            return Err(DgcError::ConfigInvalid("min_bits must be positive".into()));
        }
        if self.bins.min_bits >= self.bins.max_bits || self.bins.max_bits > 32 {
            return Err(DgcError::ConfigInvalid(format!(
                "bit budget must satisfy 1 <= min_bits < max_bits <= 32, got [{}, {}]",
                self.bins.min_bits, self.bins.max_bits
            )));
        }
        if !matches!(self.bins.bit_mode, 1 | 2) {
            return Err(DgcError::ConfigInvalid(format!(
                "bit_mode must be 1 or 2, got {}",
                self.bins.bit_mode
            )));
        }
        Ok(())
    }

    /// Resolution of the uniform density grid along one axis.
    pub fn cells_per_axis(&self) -> usize {
        let e = self.density.extents;
        (1 + e.max - e.min).max(0) as usize
    }

    /// The contiguous run of density files owned by `rank`.
    ///
    /// Each rank owns `|files| / nb_ranks` files by index `rank * offset + i`.
    /// Fails when the list cannot be split evenly, unless there is only one
    /// rank (which then owns everything).
    pub fn partition(&self, rank: usize, nb_ranks: usize) -> Result<&[DensityInput]> {
        let files = self.density.inputs.len();
        let mismatch = files < nb_ranks || files % nb_ranks != 0;
        if nb_ranks != 1 && mismatch {
            return Err(DgcError::RankPartitionMismatch {
                files,
                ranks: nb_ranks,
            });
        }
        let offset = files / nb_ranks;
        Ok(&self.density.inputs[rank * offset..(rank + 1) * offset])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(inputs: usize) -> String {
        let files: Vec<String> = (0..inputs)
            .map(|i| format!(r#"{{ "data": "rho_{i}.raw", "count": 10 }}"#))
            .collect();
        format!(
            r#"{{
              "hacc": {{ "input": "in.ptc", "output": "out.ptc" }},
              "density": {{
                "inputs": [{}],
                "extents": {{ "min": 0, "max": 7 }}
              }},
              "bins": {{ "count": 4, "adaptive": false, "min_bits": 16, "max_bits": 24 }},
              "plots": {{ "density": "density", "buckets": "buckets" }}
            }}"#,
            files.join(",")
        )
    }

    #[test]
    fn parses_and_validates() {
        let config: RunConfig = serde_json::from_str(&sample_json(4)).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cells_per_axis(), 8);
        assert_eq!(config.bins.bit_mode, 2, "bit_mode defaults to mode 2");
    }

    #[test]
    fn missing_key_is_rejected() {
        let bad = r#"{ "hacc": { "input": "a", "output": "b" } }"#;
        assert!(serde_json::from_str::<RunConfig>(bad).is_err());
    }

    #[test]
    fn bit_budget_order_is_enforced() {
        let mut config: RunConfig = serde_json::from_str(&sample_json(1)).unwrap();
        config.bins.min_bits = 24;
        config.bins.max_bits = 16;
        assert!(matches!(
            config.validate(),
            Err(DgcError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn two_ranks_split_four_files() {
        let config: RunConfig = serde_json::from_str(&sample_json(4)).unwrap();

        let rank0 = config.partition(0, 2).unwrap();
        let rank1 = config.partition(1, 2).unwrap();
        assert_eq!(rank0.len(), 2);
        assert_eq!(rank1.len(), 2);
        assert_eq!(rank0[0].data, PathBuf::from("rho_0.raw"));
        assert_eq!(rank1[0].data, PathBuf::from("rho_2.raw"));

        let local: u64 = rank0.iter().map(|f| f.count).sum();
        assert_eq!(local, 20);
    }

    #[test]
    fn three_ranks_four_files_mismatch() {
        let config: RunConfig = serde_json::from_str(&sample_json(4)).unwrap();
        assert!(matches!(
            config.partition(0, 3),
            Err(DgcError::RankPartitionMismatch { files: 4, ranks: 3 })
        ));
    }

    #[test]
    fn single_rank_owns_everything() {
        let config: RunConfig = serde_json::from_str(&sample_json(3)).unwrap();
        assert_eq!(config.partition(0, 1).unwrap().len(), 3);
    }
}
