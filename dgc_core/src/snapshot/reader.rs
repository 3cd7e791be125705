//! Reader side of the particle I/O adapter.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{DgcError, Result};
use crate::snapshot::format::{
    type_size, ColumnEntry, SnapshotHeader, COLUMN_ENTRY_SIZE, HEADER_SIZE, TYPE_F32, TYPE_I64,
};

/// One loaded column, decoded to its declared element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::F32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_f32(self, column: &str) -> Result<Vec<f32>> {
        match self {
            ColumnData::F32(v) => Ok(v),
            ColumnData::I64(_) => Err(DgcError::SnapshotFormat(format!(
                "column '{column}' is not f32"
            ))),
        }
    }

    pub fn into_i64(self, column: &str) -> Result<Vec<i64>> {
        match self {
            ColumnData::I64(v) => Ok(v),
            ColumnData::F32(_) => Err(DgcError::SnapshotFormat(format!(
                "column '{column}' is not i64"
            ))),
        }
    }
}

/// Column-at-a-time reader for PTC1 snapshots.
///
/// Opening parses the header and the full column table; [`load`] then seeks
/// straight to the requested payload, verifies its checksum, and decodes it
/// into a typed vector the caller owns.
///
/// [`load`]: SnapshotReader::load
pub struct SnapshotReader {
    file: File,
    header: SnapshotHeader,
    entries: Vec<ColumnEntry>,
}

impl SnapshotReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)?;
        let header = SnapshotHeader::from_bytes(&header_buf)?;
        if header.version != 1 {
            return Err(DgcError::SnapshotFormat(format!(
                "unsupported PTC1 version {}",
                header.version
            )));
        }

        let mut entries = Vec::with_capacity(header.column_count as usize);
        let mut entry_buf = [0u8; COLUMN_ENTRY_SIZE as usize];
        for _ in 0..header.column_count {
            file.read_exact(&mut entry_buf)?;
            entries.push(ColumnEntry::from_bytes(&entry_buf)?);
        }

        Ok(Self {
            file,
            header,
            entries,
        })
    }

    /// Rank-local particle count declared by the snapshot.
    pub fn num_elements(&self) -> u64 {
        self.header.num_elems
    }

    /// (min, max) data extents along `axis`, from the file header.
    pub fn data_extents(&self, axis: usize) -> (f64, f64) {
        self.header.data_extents[axis]
    }

    pub fn phys_origin(&self) -> [f64; 3] {
        self.header.phys_origin
    }

    pub fn phys_scale(&self) -> [f64; 3] {
        self.header.phys_scale
    }

    pub fn mpi_partition(&self) -> [u32; 3] {
        self.header.mpi_partition
    }

    pub fn columns(&self) -> &[ColumnEntry] {
        &self.entries
    }

    /// Load a column by name. Returns `Ok(None)` when the snapshot has no
    /// column of that name.
    pub fn load(&mut self, name: &str) -> Result<Option<ColumnData>> {
        let entry = match self.entries.iter().find(|e| e.name == name) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        let elem = type_size(entry.type_id)?;
        if entry.len_bytes != self.header.num_elems * elem as u64 {
            return Err(DgcError::SnapshotFormat(format!(
                "column '{}' holds {} bytes, expected {} elements of {} bytes",
                entry.name, entry.len_bytes, self.header.num_elems, elem
            )));
        }

        self.file.seek(SeekFrom::Start(entry.offset))?;
        let mut payload = vec![0u8; entry.len_bytes as usize];
        self.file.read_exact(&mut payload)?;

        let computed = xxh3_64(&payload);
        if computed != entry.checksum {
            return Err(DgcError::SnapshotFormat(format!(
                "column '{}' checksum mismatch: expected {:016x}, got {:016x}",
                entry.name, entry.checksum, computed
            )));
        }

        let data = match entry.type_id {
            TYPE_F32 => ColumnData::F32(
                payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                    .collect(),
            ),
            TYPE_I64 => ColumnData::I64(
                payload
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                    .collect(),
            ),
            other => {
                return Err(DgcError::SnapshotFormat(format!(
                    "unknown column type id {other}"
                )))
            }
        };
        Ok(Some(data))
    }
}
