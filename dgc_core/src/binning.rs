//! Binning engine: bin boundaries over the density distribution and the
//! per-bin bit budgets.
//!
//! Two modes. Fixed-width bins span the globally reduced density range in
//! equal steps. Adaptive mode builds equiprobable bins from rank-local
//! sample quantiles, with the bin count recomputed by the Prins rule
//! `⌊2·n^(2/5)⌋`; every adaptive bin then holds `⌊n/nb_bins⌋` cells by
//! construction.

use crate::error::{DgcError, Result};

/// Bin boundaries over the density distribution.
#[derive(Debug, Clone)]
pub enum BinPartition {
    FixedWidth { nb_bins: usize },
    Adaptive {
        /// `bin_ranges[i]` is the density at rank `i·bin_capacity` of the
        /// locally sorted field.
        bin_ranges: Vec<f32>,
        bin_capacity: usize,
    },
}

impl BinPartition {
    pub fn fixed(nb_bins: usize) -> Self {
        BinPartition::FixedWidth { nb_bins }
    }

    /// Build rank-local equiprobable quantile thresholds from the density
    /// field. `nb_bins` must already be the recomputed adaptive count.
    pub fn adaptive(density: &[f32], nb_bins: usize) -> Result<Self> {
        if nb_bins == 0 || density.len() < nb_bins {
            return Err(DgcError::Invariant(format!(
                "cannot build {} quantile bins from {} cells",
                nb_bins,
                density.len()
            )));
        }
        let bin_capacity = density.len() / nb_bins;

        let mut sorted = density.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let bin_ranges = (0..nb_bins).map(|i| sorted[i * bin_capacity]).collect();
        Ok(BinPartition::Adaptive {
            bin_ranges,
            bin_capacity,
        })
    }

    pub fn nb_bins(&self) -> usize {
        match self {
            BinPartition::FixedWidth { nb_bins } => *nb_bins,
            BinPartition::Adaptive { bin_ranges, .. } => bin_ranges.len(),
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, BinPartition::Adaptive { .. })
    }

    /// Map a density value to its bucket.
    ///
    /// Fixed-width classification consults the rank-local extrema, not the
    /// globally reduced range the histogram uses; a degenerate range sends
    /// everything to bin 0.
    pub fn bucket_index(&self, rho: f32, local_min: f32, local_max: f32) -> usize {
        match self {
            BinPartition::FixedWidth { nb_bins } => {
                let range = local_max - local_min;
                if range <= 0.0 {
                    return 0;
                }
                let coef = rho / range;
                ((coef * *nb_bins as f32).floor() as usize).min(nb_bins - 1)
            }
            BinPartition::Adaptive { bin_ranges, .. } => {
                let nb_bins = bin_ranges.len();
                if rho < bin_ranges[0] {
                    return 0;
                }
                for i in 1..nb_bins {
                    if bin_ranges[i - 1] <= rho && rho <= bin_ranges[i] {
                        return i;
                    }
                }
                nb_bins - 1
            }
        }
    }
}

/// Prins equiprobable rule: `nb_bins = ⌊2·n^(2/5)⌋`.
pub fn adaptive_bin_count(local_rho_count: usize) -> usize {
    (2.0 * (local_rho_count as f64).powf(2.0 / 5.0)) as usize
}

/// Rank-local histogram over the globally reduced density range.
///
/// Adaptive bins are equiprobable by construction, so their histogram is
/// synthetic: every bin reports the quantile capacity instead of a count.
pub fn histogram(
    partition: &BinPartition,
    density: &[f32],
    total_rho_min: f64,
    total_rho_max: f64,
) -> Vec<i64> {
    let nb_bins = partition.nb_bins();
    match partition {
        BinPartition::FixedWidth { .. } => {
            let range = total_rho_max - total_rho_min;
            let mut histo = vec![0i64; nb_bins];
            if range <= 0.0 {
                histo[0] = density.len() as i64;
                return histo;
            }
            let width = range / nb_bins as f64;
            for &v in density {
                let k = ((v as f64 - total_rho_min) / width) as usize;
                histo[k.min(nb_bins - 1)] += 1;
            }
            histo
        }
        BinPartition::Adaptive { bin_capacity, .. } => vec![*bin_capacity as i64; nb_bins],
    }
}

// ── Bit budgets ─────────────────────────────────────────────────────────────

/// Which hand-tuned step table drives non-adaptive bit assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTable {
    ModeOne,
    ModeTwo,
}

impl StepTable {
    pub fn from_mode(mode: u8) -> Option<Self> {
        match mode {
            1 => Some(StepTable::ModeOne),
            2 => Some(StepTable::ModeTwo),
            _ => None,
        }
    }

    fn raw_bits(&self, bin: usize, min_bits: u32, max_bits: u32) -> u32 {
        match self {
            StepTable::ModeOne => match bin {
                0 => min_bits,
                1 => 20,
                2..=4 => 21,
                5..=24 => 22,
                25..=99 => 23,
                100..=199 => 24,
                200..=499 => 25,
                500..=1199 => 26,
                _ => max_bits,
            },
            StepTable::ModeTwo => match bin {
                0 => min_bits,
                1..=4 => 22,
                5..=24 => 23,
                25..=99 => 24,
                100..=199 => 25,
                200..=1199 => 26,
                _ => max_bits,
            },
        }
    }
}

/// Fill the per-bin bit table.
///
/// Non-adaptive mode walks the selected step table, clamping each entry
/// into `[min_bits, max_bits]` so a narrow configured budget still honors
/// the range invariant. Adaptive mode spreads the budget across
/// equal-sized bin slots: slot `i` gets `min_bits + i` for the two lowest
/// slots and `max_bits` beyond, with the remainder tail also at
/// `max_bits`.
pub fn assign_bits(
    partition: &BinPartition,
    min_bits: u32,
    max_bits: u32,
    table: StepTable,
) -> Vec<u32> {
    let nb_bins = partition.nb_bins();
    if !partition.is_adaptive() {
        return (0..nb_bins)
            .map(|i| table.raw_bits(i, min_bits, max_bits).clamp(min_bits, max_bits))
            .collect();
    }

    let mut bits = vec![max_bits; nb_bins];
    let values_width = (1 + max_bits - min_bits) as usize;
    let per_slot = nb_bins / values_width;
    for i in 0..values_width {
        for j in 0..per_slot {
            bits[i * per_slot + j] = if i < 2 {
                min_bits + i as u32
            } else {
                max_bits
            };
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two-mode density field: half the cells empty, half dense.
    #[test]
    fn fixed_width_splits_two_modes() {
        let density = [0.0f32, 0.0, 2.0, 2.0];
        let partition = BinPartition::fixed(2);

        let histo = histogram(&partition, &density, 0.0, 2.0);
        assert_eq!(histo, vec![2, 2]);

        // Classifier agrees: the boundary sits at 1.0.
        assert_eq!(partition.bucket_index(0.0, 0.0, 2.0), 0);
        assert_eq!(partition.bucket_index(2.0, 0.0, 2.0), 1);
    }

    #[test]
    fn degenerate_range_uses_leftmost_bin() {
        let density = vec![1.0f32; 512];
        let partition = BinPartition::fixed(4);

        let histo = histogram(&partition, &density, 1.0, 1.0);
        assert_eq!(histo, vec![512, 0, 0, 0]);
        assert_eq!(partition.bucket_index(1.0, 1.0, 1.0), 0);
    }

    #[test]
    fn fixed_histogram_total_matches_cell_count() {
        let density: Vec<f32> = (0..1000).map(|i| (i % 97) as f32 * 0.5).collect();
        let partition = BinPartition::fixed(16);
        let histo = histogram(&partition, &density, 0.0, 48.0);
        assert_eq!(histo.iter().sum::<i64>(), 1000);
    }

    #[test]
    fn fixed_histogram_edges_agree_with_classifier() {
        // Values on exact bin edges land in the bin whose left edge they are,
        // with the last bin closed above.
        let partition = BinPartition::fixed(4);
        let density = [0.0f32, 1.0, 2.0, 3.0, 4.0];
        let histo = histogram(&partition, &density, 0.0, 4.0);
        assert_eq!(histo, vec![1, 1, 1, 2]);
    }

    #[test]
    fn adaptive_count_follows_prins_rule() {
        // ⌊2·10000^0.4⌋ = 79
        assert_eq!(adaptive_bin_count(10_000), 79);
        assert_eq!(adaptive_bin_count(512), 24);
    }

    #[test]
    fn adaptive_ranges_are_sorted_quantiles() {
        let n = 10_000usize;
        let density: Vec<f32> = (0..n).rev().map(|i| i as f32).collect();
        let nb_bins = adaptive_bin_count(n);
        assert_eq!(nb_bins, 79);

        let partition = BinPartition::adaptive(&density, nb_bins).unwrap();
        let BinPartition::Adaptive {
            bin_ranges,
            bin_capacity,
        } = &partition
        else {
            panic!("expected adaptive partition");
        };
        assert_eq!(*bin_capacity, 126);
        assert_eq!(bin_ranges[0], 0.0);
        assert_eq!(bin_ranges[1], 126.0);
        assert_eq!(bin_ranges[2], 252.0);
    }

    #[test]
    fn adaptive_classifier_walks_thresholds() {
        let partition = BinPartition::Adaptive {
            bin_ranges: vec![0.0, 10.0, 20.0, 30.0],
            bin_capacity: 5,
        };
        assert_eq!(partition.bucket_index(-1.0, 0.0, 0.0), 0);
        assert_eq!(partition.bucket_index(5.0, 0.0, 0.0), 1);
        assert_eq!(partition.bucket_index(10.0, 0.0, 0.0), 1);
        assert_eq!(partition.bucket_index(25.0, 0.0, 0.0), 3);
        assert_eq!(partition.bucket_index(99.0, 0.0, 0.0), 3);
    }

    #[test]
    fn adaptive_histogram_is_synthetic() {
        let density: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let nb_bins = adaptive_bin_count(density.len());
        let partition = BinPartition::adaptive(&density, nb_bins).unwrap();
        let histo = histogram(&partition, &density, 0.0, 999.0);
        let capacity = density.len() / nb_bins;
        assert!(histo.iter().all(|&c| c == capacity as i64));
    }

    #[test]
    fn mode_two_table_shape() {
        let partition = BinPartition::fixed(2000);
        let bits = assign_bits(&partition, 18, 28, StepTable::ModeTwo);
        assert_eq!(bits[0], 18);
        assert_eq!(bits[1], 22);
        assert_eq!(bits[4], 22);
        assert_eq!(bits[5], 23);
        assert_eq!(bits[24], 23);
        assert_eq!(bits[25], 24);
        assert_eq!(bits[100], 25);
        assert_eq!(bits[200], 26);
        assert_eq!(bits[1199], 26);
        assert_eq!(bits[1200], 28);
        assert_eq!(bits[1999], 28);
    }

    #[test]
    fn mode_one_table_shape() {
        let partition = BinPartition::fixed(1500);
        let bits = assign_bits(&partition, 18, 28, StepTable::ModeOne);
        assert_eq!(bits[1], 20);
        assert_eq!(bits[2], 21);
        assert_eq!(bits[200], 25);
        assert_eq!(bits[500], 26);
        assert_eq!(bits[1200], 28);
    }

    #[test]
    fn narrow_budget_clamps_step_tables() {
        let partition = BinPartition::fixed(2000);
        let bits = assign_bits(&partition, 16, 24, StepTable::ModeTwo);
        assert!(bits.iter().all(|&b| (16..=24).contains(&b)));
        assert_eq!(bits[200], 24, "26 clamps down to max_bits");
    }

    #[test]
    fn adaptive_bits_cover_tail_with_max() {
        // 79 bins, budget width 9 → 8 bins per slot, tail of 7 bins.
        let density: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        let partition = BinPartition::adaptive(&density, 79).unwrap();
        let bits = assign_bits(&partition, 16, 24, StepTable::ModeTwo);

        assert!(bits.iter().all(|&b| (16..=24).contains(&b)));
        assert_eq!(bits[0], 16);
        assert_eq!(bits[8], 17);
        assert_eq!(bits[16], 24, "slots past the second jump to max_bits");
        assert!(bits[72..].iter().all(|&b| b == 24), "remainder tail is max_bits");
    }
}
