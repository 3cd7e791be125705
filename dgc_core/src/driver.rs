//! Driver: sequences the density-guided compression pipeline.
//!
//! Stage order is fixed: cache_data → compute_density_bins →
//! compute_frequencies → bucket_particles → process(x,y,z) → dump. Every
//! stage ends with a barrier, so any side effect observed after a stage has
//! happened on all ranks. Plot artifacts are written by rank 0 only, after
//! the corresponding reduction.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::binning::{self, BinPartition, StepTable};
use crate::bucket::{self, Buckets};
use crate::codec::Kernel;
use crate::comm::{Collectives, ReduceOp};
use crate::config::{DensityInput, RunConfig};
use crate::density::DensityField;
use crate::error::{DgcError, Result};
use crate::snapshot::{
    SnapshotReader, SnapshotWriter, VAR_HAS_EXTRA_SPACE, VAR_IS_PHYS_COORD_X,
    VAR_IS_PHYS_COORD_Y, VAR_IS_PHYS_COORD_Z,
};
use crate::pipeline;

const COORD_COLUMNS: [&str; 3] = ["x", "y", "z"];
const VELOC_COLUMNS: [&str; 3] = ["vx", "vy", "vz"];
const ID_COLUMN: &str = "id";

pub struct Driver<'a> {
    config: RunConfig,
    comm: &'a dyn Collectives,
    step_table: StepTable,
    /// Density chunk files owned by this rank.
    files: Vec<DensityInput>,

    local_particles: usize,
    total_particles: i64,
    coords: [Vec<f32>; 3],
    velocs: [Vec<f32>; 3],
    ids: Vec<i64>,
    coords_min: [f32; 3],
    coords_max: [f32; 3],

    // Physical parameters carried from the input snapshot to the writer.
    data_extents: [(f64, f64); 3],
    phys_origin: [f64; 3],
    phys_scale: [f64; 3],
    mpi_partition: [u32; 3],

    density: DensityField,
    total_rho_count: i64,
    local_rho: (f32, f32),
    total_rho: (f64, f64),
    partition: Option<BinPartition>,
    bits: Vec<u32>,
    histogram: Vec<i64>,
    buckets: Option<Buckets>,

    decompressed: [Vec<f32>; 3],
}

impl<'a> Driver<'a> {
    /// Validate the run against the fabric before any data I/O: the density
    /// partition must split across the ranks, and the collective output
    /// write requires a power-of-two rank count.
    pub fn new(config: RunConfig, comm: &'a dyn Collectives) -> Result<Self> {
        config.validate()?;

        if !comm.size().is_power_of_two() {
            return Err(DgcError::ConfigInvalid(format!(
                "output dump requires a power-of-two rank count, got {}",
                comm.size()
            )));
        }

        let files = config.partition(comm.rank(), comm.size())?.to_vec();
        let step_table = StepTable::from_mode(config.bins.bit_mode)
            .ok_or_else(|| DgcError::ConfigInvalid("bit_mode must be 1 or 2".into()))?;

        Ok(Self {
            config,
            comm,
            step_table,
            files,
            local_particles: 0,
            total_particles: 0,
            coords: Default::default(),
            velocs: Default::default(),
            ids: Vec::new(),
            coords_min: [0.0; 3],
            coords_max: [0.0; 3],
            data_extents: [(0.0, 0.0); 3],
            phys_origin: [0.0; 3],
            phys_scale: [0.0; 3],
            mpi_partition: [1, 1, 1],
            density: DensityField::from_values(Vec::new()),
            total_rho_count: 0,
            local_rho: (0.0, 0.0),
            total_rho: (0.0, 0.0),
            partition: None,
            bits: Vec::new(),
            histogram: Vec::new(),
            buckets: None,
            decompressed: Default::default(),
        })
    }

    /// Run the whole pipeline with the given lossy kernel and optional
    /// chained lossless kernel.
    pub fn run(
        &mut self,
        lossy: &mut dyn Kernel,
        mut chain: Option<&mut dyn Kernel>,
    ) -> Result<()> {
        self.cache_data()?;
        self.compute_density_bins()?;
        self.compute_frequencies()?;
        self.dump_bits_distrib()?;
        self.bucket_particles()?;
        for axis in 0..3 {
            match chain.as_mut() {
                Some(c) => self.process(axis, lossy, Some(&mut **c))?,
                None => self.process(axis, lossy, None)?,
            }
        }
        self.dump()
    }

    pub fn local_particles(&self) -> usize {
        self.local_particles
    }

    pub fn nb_bins(&self) -> usize {
        self.partition.as_ref().map_or(0, BinPartition::nb_bins)
    }

    fn partition_ref(&self) -> Result<&BinPartition> {
        self.partition
            .as_ref()
            .ok_or_else(|| DgcError::Invariant("bin partition not yet computed".into()))
    }

    // ── Stage 1: load particles and density ────────────────────────────────

    fn cache_data(&mut self) -> Result<()> {
        let root = self.comm.is_root();
        if root {
            info!(snapshot = %self.config.hacc.input.display(), "caching particle data");
        }

        let mut reader = SnapshotReader::open(&self.config.hacc.input)?;

        for (d, name) in COORD_COLUMNS.iter().enumerate() {
            let column = reader
                .load(name)?
                .ok_or_else(|| {
                    DgcError::SnapshotFormat(format!("input snapshot is missing column '{name}'"))
                })?
                .into_f32(name)?;
            if d == 0 {
                self.local_particles = column.len();
            } else if column.len() != self.local_particles {
                return Err(DgcError::SnapshotFormat(format!(
                    "column '{}' holds {} particles, expected {}",
                    name,
                    column.len(),
                    self.local_particles
                )));
            }
            self.coords[d] = column;
            self.comm.barrier();
        }

        self.total_particles = self.comm.sum_i64(self.local_particles as i64);

        for d in 0..3 {
            let (min, max) = reader.data_extents(d);
            self.data_extents[d] = (min, max);
            self.coords_min[d] = min as f32;
            self.coords_max[d] = max as f32;
        }

        for (d, name) in VELOC_COLUMNS.iter().enumerate() {
            let column = reader
                .load(name)?
                .ok_or_else(|| {
                    DgcError::SnapshotFormat(format!("input snapshot is missing column '{name}'"))
                })?
                .into_f32(name)?;
            if column.len() != self.local_particles {
                return Err(DgcError::SnapshotFormat(format!(
                    "column '{name}' length does not match particle count"
                )));
            }
            self.velocs[d] = column;
            self.comm.barrier();
        }

        self.ids = reader
            .load(ID_COLUMN)?
            .ok_or_else(|| DgcError::SnapshotFormat("input snapshot is missing column 'id'".into()))?
            .into_i64(ID_COLUMN)?;
        if self.ids.len() != self.local_particles {
            return Err(DgcError::SnapshotFormat(
                "column 'id' length does not match particle count".into(),
            ));
        }
        self.comm.barrier();

        self.phys_origin = reader.phys_origin();
        self.phys_scale = reader.phys_scale();
        self.mpi_partition = reader.mpi_partition();
        drop(reader);

        if root {
            info!(files = self.files.len(), "caching density data");
        }
        self.density = DensityField::load(&self.files)?;
        self.total_rho_count = self.comm.sum_i64(self.density.len() as i64);

        self.comm.barrier();
        if root {
            info!(
                particles = self.total_particles,
                cells = self.total_rho_count,
                "data cached"
            );
        }
        Ok(())
    }

    // ── Stage 2: bin boundaries and bit budgets ────────────────────────────

    fn compute_density_bins(&mut self) -> Result<()> {
        let partition = if self.config.bins.adaptive {
            let nb_bins = binning::adaptive_bin_count(self.density.len());
            if self.comm.is_root() {
                info!(
                    nb_bins,
                    capacity = self.density.len() / nb_bins.max(1),
                    "equiprobable binning"
                );
            }
            BinPartition::adaptive(self.density.values(), nb_bins)?
        } else {
            BinPartition::fixed(self.config.bins.count)
        };

        self.bits = binning::assign_bits(
            &partition,
            self.config.bins.min_bits,
            self.config.bins.max_bits,
            self.step_table,
        );
        self.partition = Some(partition);
        self.comm.barrier();
        Ok(())
    }

    // ── Stage 3: density extrema and histogram ─────────────────────────────

    fn compute_frequencies(&mut self) -> Result<()> {
        let (local_min, local_max) = self.density.local_min_max()?;
        self.local_rho = (local_min, local_max);
        self.total_rho = (
            self.comm.min_f64(local_min as f64),
            self.comm.max_f64(local_max as f64),
        );

        let local_histo = binning::histogram(
            self.partition_ref()?,
            self.density.values(),
            self.total_rho.0,
            self.total_rho.1,
        );
        self.histogram = self.comm.all_reduce_i64(ReduceOp::Sum, &local_histo);

        if self.comm.is_root() {
            self.dump_histogram()?;
            info!(
                cells = self.total_rho_count,
                nb_bins = self.nb_bins(),
                rho_min = self.total_rho.0,
                rho_max = self.total_rho.1,
                plot = %format!("{}.dat", self.config.plots.density),
                "frequencies computed"
            );
        }
        self.comm.barrier();
        Ok(())
    }

    // ── Stage 4: bucket particles by containing-cell density ───────────────

    fn bucket_particles(&mut self) -> Result<()> {
        if self.comm.is_root() {
            info!("bucketing particles");
        }

        let buckets = bucket::bucket_particles(
            [&self.coords[0], &self.coords[1], &self.coords[2]],
            self.coords_min,
            self.coords_max,
            self.config.cells_per_axis(),
            &self.density,
            self.partition_ref()?,
            self.local_rho.0,
            self.local_rho.1,
        )?;
        if buckets.total() != self.local_particles {
            return Err(DgcError::Invariant(format!(
                "buckets hold {} particles, expected {}",
                buckets.total(),
                self.local_particles
            )));
        }

        let sizes = buckets.sizes();
        if let Some(totals) = self.comm.reduce_i64(ReduceOp::Sum, &sizes) {
            self.dump_bucket_distrib(&totals)?;
        }

        self.buckets = Some(buckets);
        // The density slab is only consulted during bucketing.
        self.density.clear();
        self.comm.barrier();
        Ok(())
    }

    // ── Stage 5: per-axis lossy round trip ─────────────────────────────────

    fn process(
        &mut self,
        axis: usize,
        lossy: &mut dyn Kernel,
        chain: Option<&mut dyn Kernel>,
    ) -> Result<()> {
        let buckets = self
            .buckets
            .as_ref()
            .ok_or_else(|| DgcError::Invariant("buckets not yet computed".into()))?;
        if self.comm.is_root() {
            info!(axis = COORD_COLUMNS[axis], "inflate and deflate data");
        }

        let data = mem::take(&mut self.coords[axis]);
        let (stream, stats) = pipeline::process_axis(&data, buckets, &self.bits, lossy, chain)?;
        drop(data);
        self.decompressed[axis] = stream;

        let local = [stats.lossy_bytes, stats.chain_bytes.unwrap_or(0)];
        if let Some(totals) = self.comm.reduce_u64(ReduceOp::Sum, &local) {
            let raw = self.total_particles as u64 * 4;
            let rate = raw as f64 / totals[0].max(1) as f64;
            if stats.chain_bytes.is_some() {
                let final_rate = raw as f64 / totals[1].max(1) as f64;
                info!(
                    axis = COORD_COLUMNS[axis],
                    raw,
                    lossy = totals[0],
                    chained = totals[1],
                    rate = %format!("{rate:.3}"),
                    final_rate = %format!("{final_rate:.3}"),
                    "axis processed"
                );
            } else {
                info!(
                    axis = COORD_COLUMNS[axis],
                    raw,
                    zip = totals[0],
                    rate = %format!("{rate:.3}"),
                    "axis processed"
                );
            }
        }
        self.comm.barrier();
        Ok(())
    }

    // ── Stage 6: reassemble and write the output snapshot ──────────────────

    fn dump(&mut self) -> Result<()> {
        self.histogram = Vec::new();

        let buckets = self
            .buckets
            .take()
            .ok_or_else(|| DgcError::Invariant("buckets not yet computed".into()))?;

        // Velocities and ids follow the same bucket-order permutation as the
        // decompressed coordinates, so row k of the output describes one
        // consistent particle.
        let ids = mem::take(&mut self.ids);
        let uid: Vec<i64> = buckets.iter_flat().map(|i| ids[i]).collect();
        drop(ids);

        let mut velocs: [Vec<f32>; 3] = Default::default();
        for d in 0..3 {
            let source = mem::take(&mut self.velocs[d]);
            velocs[d] = buckets.iter_flat().map(|i| source[i]).collect();
        }
        drop(buckets);
        self.comm.barrier();

        self.comm.cart_create(self.mpi_partition)?;

        let mut writer = SnapshotWriter::create(&self.config.hacc.output);
        writer.set_num_elems(self.local_particles as u64);
        writer.set_mpi_partition(self.mpi_partition);
        for d in 0..3 {
            writer.set_data_extents(d, self.data_extents[d].0, self.data_extents[d].1);
            writer.set_phys_origin(d, self.phys_origin[d]);
            writer.set_phys_scale(d, self.phys_scale[d]);
        }

        let coord_flags = [
            VAR_HAS_EXTRA_SPACE | VAR_IS_PHYS_COORD_X,
            VAR_HAS_EXTRA_SPACE | VAR_IS_PHYS_COORD_Y,
            VAR_HAS_EXTRA_SPACE | VAR_IS_PHYS_COORD_Z,
        ];
        for d in 0..3 {
            writer.add_f32(COORD_COLUMNS[d], &self.decompressed[d], coord_flags[d])?;
        }
        for d in 0..3 {
            writer.add_f32(VELOC_COLUMNS[d], &velocs[d], VAR_HAS_EXTRA_SPACE)?;
        }
        writer.add_i64(ID_COLUMN, &uid, VAR_HAS_EXTRA_SPACE)?;
        writer.write()?;

        if self.comm.is_root() {
            info!(output = %self.config.hacc.output.display(), "snapshot written");
        }

        self.decompressed = Default::default();
        self.comm.barrier();
        Ok(())
    }

    // ── Plot artifacts ─────────────────────────────────────────────────────

    /// x-axis position of bin `k` in the plot files: the left fixed-width
    /// edge, or the quantile threshold shifted by the global minimum.
    fn plot_position(&self, k: usize) -> Result<f64> {
        Ok(match self.partition_ref()? {
            BinPartition::FixedWidth { nb_bins } => {
                let width = (self.total_rho.1 - self.total_rho.0) / *nb_bins as f64;
                self.total_rho.0 + k as f64 * width
            }
            BinPartition::Adaptive { bin_ranges, .. } => {
                self.total_rho.0 + bin_ranges[k] as f64
            }
        })
    }

    fn dump_histogram(&self) -> Result<()> {
        let path = format!("{}.dat", self.config.plots.density);
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "# bins: {}", self.nb_bins())?;
        writeln!(out, "# col 1: density range")?;
        writeln!(out, "# col 2: particle count")?;
        for (k, count) in self.histogram.iter().enumerate() {
            writeln!(out, "{}\t{}", self.plot_position(k)?, count)?;
        }
        Ok(())
    }

    fn dump_bucket_distrib(&self, totals: &[i64]) -> Result<()> {
        let path = format!("{}.dat", self.config.plots.buckets);
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "# bins: {}", self.nb_bins())?;
        writeln!(out, "# col 1: bin")?;
        writeln!(out, "# col 2: particle count")?;
        for (k, count) in totals.iter().enumerate() {
            writeln!(out, "{k}\t{count}")?;
        }
        Ok(())
    }

    fn dump_bits_distrib(&self) -> Result<()> {
        if self.comm.is_root() {
            // Lives next to the density plot, under its fixed name.
            let path = match Path::new(&self.config.plots.density).parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.join("bits_distrib.dat"),
                _ => PathBuf::from("bits_distrib.dat"),
            };
            let mut out = BufWriter::new(File::create(path)?);
            writeln!(out, "# bins: {}", self.nb_bins())?;
            writeln!(out, "# col 1: density")?;
            writeln!(out, "# col 2: bits")?;
            for (k, bits) in self.bits.iter().enumerate() {
                writeln!(out, "{}\t{}", self.plot_position(k)?, bits)?;
            }
        }
        self.comm.barrier();
        Ok(())
    }
}
