//! Particle bucketer: map each particle to the density bin of its
//! containing grid cell.

use crate::binning::BinPartition;
use crate::density::DensityField;
use crate::error::{DgcError, Result};

/// Per-bin lists of local particle indices. The union of all lists is
/// exactly `[0, local_particles)` with no duplicates.
#[derive(Debug, Clone)]
pub struct Buckets {
    lists: Vec<Vec<usize>>,
}

impl Buckets {
    pub fn nb_bins(&self) -> usize {
        self.lists.len()
    }

    pub fn list(&self, bin: usize) -> &[usize] {
        &self.lists[bin]
    }

    /// Per-bucket sizes, for the reduced bucket-distribution plot.
    pub fn sizes(&self) -> Vec<i64> {
        self.lists.iter().map(|l| l.len() as i64).collect()
    }

    pub fn total(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Flat traversal in bucket-index order: the permutation applied to
    /// every output stream.
    pub fn iter_flat(&self) -> impl Iterator<Item = usize> + '_ {
        self.lists.iter().flat_map(|l| l.iter().copied())
    }
}

/// Flat index of the grid cell containing a particle.
///
/// Coordinates are shifted against the lower extents and scaled into
/// logical cells; particles sitting on the upper boundary fold into the
/// last cell along that axis.
pub fn deduce_cell_index(
    particle: [f32; 3],
    coords_min: [f32; 3],
    coords_max: [f32; 3],
    cells_per_axis: usize,
) -> Result<usize> {
    let n = cells_per_axis as f32;
    let mut cell = [0usize; 3];
    for d in 0..3 {
        let shifted = particle[d] - coords_min[d];
        let range = coords_max[d] - coords_min[d];
        if shifted < 0.0 {
            return Err(DgcError::Invariant(format!(
                "particle coordinate {} below axis {} extent {}",
                particle[d], d, coords_min[d]
            )));
        }
        let c = if range > 0.0 {
            (shifted * n / range).floor() as usize
        } else {
            0
        };
        cell[d] = c.min(cells_per_axis - 1);
    }
    Ok(cell[0] + cell[1] * cells_per_axis + cell[2] * cells_per_axis * cells_per_axis)
}

/// Assign every local particle to a bucket through its containing cell's
/// density.
pub fn bucket_particles(
    coords: [&[f32]; 3],
    coords_min: [f32; 3],
    coords_max: [f32; 3],
    cells_per_axis: usize,
    density: &DensityField,
    partition: &BinPartition,
    local_rho_min: f32,
    local_rho_max: f32,
) -> Result<Buckets> {
    let local_particles = coords[0].len();
    let nb_bins = partition.nb_bins();
    let mut lists = vec![Vec::new(); nb_bins];

    for i in 0..local_particles {
        let particle = [coords[0][i], coords[1][i], coords[2][i]];
        let cell = deduce_cell_index(particle, coords_min, coords_max, cells_per_axis)?;
        if cell >= density.len() {
            return Err(DgcError::Invariant(format!(
                "cell index {} outside density field of {} cells",
                cell,
                density.len()
            )));
        }
        let bucket = partition.bucket_index(density.values()[cell], local_rho_min, local_rho_max);
        if bucket >= nb_bins {
            return Err(DgcError::Invariant(format!(
                "bucket index {bucket} outside {nb_bins} bins"
            )));
        }
        lists[bucket].push(i);
    }

    Ok(Buckets { lists })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: [f32; 3] = [0.0; 3];
    const MAX: [f32; 3] = [8.0; 3];

    #[test]
    fn interior_points_stay_in_grid() {
        for &p in &[0.0f32, 0.1, 3.999, 4.0, 7.3] {
            let idx = deduce_cell_index([p, p, p], MIN, MAX, 8).unwrap();
            assert!(idx < 512, "index {idx} for coordinate {p}");
        }
    }

    #[test]
    fn upper_boundary_folds_into_last_cell() {
        let idx = deduce_cell_index([8.0, 8.0, 8.0], MIN, MAX, 8).unwrap();
        assert_eq!(idx, 511);
    }

    #[test]
    fn flat_index_is_row_major() {
        // Cell (1, 2, 3) → 1 + 2·8 + 3·64
        let idx = deduce_cell_index([1.5, 2.5, 3.5], MIN, MAX, 8).unwrap();
        assert_eq!(idx, 1 + 16 + 192);
    }

    #[test]
    fn below_extent_is_an_invariant_violation() {
        assert!(deduce_cell_index([-0.5, 1.0, 1.0], MIN, MAX, 8).is_err());
    }

    #[test]
    fn buckets_partition_all_particles() {
        // 4-cell axis, two-mode density: low half vs high half.
        let n = 100;
        let x: Vec<f32> = (0..n).map(|i| (i as f32 + 0.5) * 8.0 / n as f32).collect();
        let y = vec![0.5f32; n];
        let z = vec![0.5f32; n];
        let density =
            DensityField::from_values((0..512).map(|c| if c % 8 < 4 { 0.0 } else { 2.0 }).collect());
        let partition = BinPartition::fixed(2);

        let buckets = bucket_particles(
            [&x, &y, &z],
            MIN,
            MAX,
            8,
            &density,
            &partition,
            0.0,
            2.0,
        )
        .unwrap();

        assert_eq!(buckets.total(), n);
        let mut seen = vec![false; n];
        for i in buckets.iter_flat() {
            assert!(!seen[i], "particle {i} bucketed twice");
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));

        // x < 4 lands in low-density cells, x >= 4 in high-density ones.
        assert_eq!(buckets.list(0).len(), 50);
        assert_eq!(buckets.list(1).len(), 50);
    }
}
