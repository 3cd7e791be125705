//! Writer side of the particle I/O adapter.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{DgcError, Result};
use crate::snapshot::format::{
    ColumnEntry, SnapshotHeader, COLUMN_ENTRY_SIZE, HEADER_SIZE, TYPE_F32, TYPE_I64,
};

struct PendingColumn {
    name: String,
    type_id: u16,
    flags: u16,
    payload: Vec<u8>,
}

/// Buffered writer for PTC1 snapshots.
///
/// Declare the element count and physical parameters, add each column, then
/// call [`write`] to emit header, column table and payloads in one pass.
///
/// [`write`]: SnapshotWriter::write
pub struct SnapshotWriter {
    path: PathBuf,
    num_elems: u64,
    data_extents: [(f64, f64); 3],
    phys_origin: [f64; 3],
    phys_scale: [f64; 3],
    mpi_partition: [u32; 3],
    columns: Vec<PendingColumn>,
}

impl SnapshotWriter {
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            num_elems: 0,
            data_extents: [(0.0, 0.0); 3],
            phys_origin: [0.0; 3],
            phys_scale: [0.0; 3],
            mpi_partition: [1, 1, 1],
            columns: Vec::new(),
        }
    }

    pub fn set_num_elems(&mut self, num_elems: u64) {
        self.num_elems = num_elems;
    }

    pub fn set_data_extents(&mut self, axis: usize, min: f64, max: f64) {
        self.data_extents[axis] = (min, max);
    }

    pub fn set_phys_origin(&mut self, axis: usize, origin: f64) {
        self.phys_origin[axis] = origin;
    }

    pub fn set_phys_scale(&mut self, axis: usize, scale: f64) {
        self.phys_scale[axis] = scale;
    }

    pub fn set_mpi_partition(&mut self, dims: [u32; 3]) {
        self.mpi_partition = dims;
    }

    /// Add an f32 column. The data length must match the declared element
    /// count.
    pub fn add_f32(&mut self, name: &str, data: &[f32], flags: u16) -> Result<()> {
        self.check_len(name, data.len())?;
        let mut payload = Vec::with_capacity(data.len() * 4);
        for v in data {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        self.columns.push(PendingColumn {
            name: name.to_string(),
            type_id: TYPE_F32,
            flags,
            payload,
        });
        Ok(())
    }

    /// Add an i64 column (particle ids).
    pub fn add_i64(&mut self, name: &str, data: &[i64], flags: u16) -> Result<()> {
        self.check_len(name, data.len())?;
        let mut payload = Vec::with_capacity(data.len() * 8);
        for v in data {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        self.columns.push(PendingColumn {
            name: name.to_string(),
            type_id: TYPE_I64,
            flags,
            payload,
        });
        Ok(())
    }

    fn check_len(&self, name: &str, len: usize) -> Result<()> {
        if len as u64 != self.num_elems {
            return Err(DgcError::SnapshotFormat(format!(
                "column '{}' holds {} elements, writer declares {}",
                name, len, self.num_elems
            )));
        }
        Ok(())
    }

    /// Emit the snapshot: header, column table, then payloads.
    pub fn write(&self) -> Result<()> {
        let header = SnapshotHeader {
            version: 1,
            column_count: self.columns.len() as u16,
            num_elems: self.num_elems,
            data_extents: self.data_extents,
            phys_origin: self.phys_origin,
            phys_scale: self.phys_scale,
            mpi_partition: self.mpi_partition,
        };

        // Payloads start right after the fixed header and the column table.
        let mut offset = HEADER_SIZE + self.columns.len() as u64 * COLUMN_ENTRY_SIZE;
        let mut entries = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            entries.push(ColumnEntry {
                name: column.name.clone(),
                type_id: column.type_id,
                flags: column.flags,
                offset,
                len_bytes: column.payload.len() as u64,
                checksum: xxh3_64(&column.payload),
            });
            offset += column.payload.len() as u64;
        }

        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(&header.to_bytes())?;
        for entry in &entries {
            out.write_all(&entry.to_bytes()?)?;
        }
        for column in &self.columns {
            out.write_all(&column.payload)?;
        }
        out.flush()?;
        Ok(())
    }
}
