//! On-disk layout of PTC1 snapshots.

use crate::error::{DgcError, Result};

/// Magic bytes: "PTC1\n" followed by three null bytes.
pub const MAGIC: &[u8; 8] = b"PTC1\n\x00\x00\x00";

/// Fixed size of the PTC1 file header in bytes.
///   magic[8] + version:u16 + column_count:u16 + reserved:u32
///   + num_elems:u64 + data_extents:6×f64 + phys_origin:3×f64
///   + phys_scale:3×f64 + mpi_partition:3×u32 + reserved[12]
///   = 8 + 2 + 2 + 4 + 8 + 48 + 24 + 24 + 12 + 12 = 144
pub const HEADER_SIZE: u64 = 144;

/// Size of each entry in the column table, in bytes.
///   name[8] + type_id:u16 + flags:u16 + _pad:u32
///   + offset:u64 + len_bytes:u64 + checksum:u64
///   = 8 + 2 + 2 + 4 + 8 + 8 + 8 = 40
pub const COLUMN_ENTRY_SIZE: u64 = 40;

// ── Column flags ────────────────────────────────────────────────────────────

/// The writer reserves trailing extra space for this column.
pub const VAR_HAS_EXTRA_SPACE: u16 = 1 << 0;
/// This column is the physical x coordinate.
pub const VAR_IS_PHYS_COORD_X: u16 = 1 << 1;
pub const VAR_IS_PHYS_COORD_Y: u16 = 1 << 2;
pub const VAR_IS_PHYS_COORD_Z: u16 = 1 << 3;

// ── Column types ────────────────────────────────────────────────────────────

pub const TYPE_F32: u16 = 0;
pub const TYPE_I64: u16 = 1;

pub fn type_size(type_id: u16) -> Result<usize> {
    match type_id {
        TYPE_F32 => Ok(4),
        TYPE_I64 => Ok(8),
        other => Err(DgcError::SnapshotFormat(format!(
            "unknown column type id {other}"
        ))),
    }
}

// ── Header ──────────────────────────────────────────────────────────────────

/// Decoded representation of the 144-byte PTC1 file header.
#[derive(Debug, Clone)]
pub struct SnapshotHeader {
    pub version: u16,
    pub column_count: u16,
    pub num_elems: u64,
    /// Per-axis (min, max) data extents read back as `coords_min/max`.
    pub data_extents: [(f64, f64); 3],
    pub phys_origin: [f64; 3],
    pub phys_scale: [f64; 3],
    /// Rank decomposition the snapshot was written with.
    pub mpi_partition: [u32; 3],
}

impl SnapshotHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.column_count.to_le_bytes());
        // buf[12..16] reserved
        buf[16..24].copy_from_slice(&self.num_elems.to_le_bytes());
        let mut at = 24;
        for d in 0..3 {
            buf[at..at + 8].copy_from_slice(&self.data_extents[d].0.to_le_bytes());
            buf[at + 8..at + 16].copy_from_slice(&self.data_extents[d].1.to_le_bytes());
            at += 16;
        }
        for d in 0..3 {
            buf[at..at + 8].copy_from_slice(&self.phys_origin[d].to_le_bytes());
            at += 8;
        }
        for d in 0..3 {
            buf[at..at + 8].copy_from_slice(&self.phys_scale[d].to_le_bytes());
            at += 8;
        }
        for d in 0..3 {
            buf[at..at + 4].copy_from_slice(&self.mpi_partition[d].to_le_bytes());
            at += 4;
        }
        // trailing reserved[12] stays zero
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if &buf[..8] != MAGIC {
            return Err(DgcError::SnapshotFormat(
                "invalid magic bytes, not a PTC1 snapshot".into(),
            ));
        }
        let f64_at = |at: usize| f64::from_le_bytes(buf[at..at + 8].try_into().unwrap());
        let u32_at = |at: usize| u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());

        let mut data_extents = [(0.0, 0.0); 3];
        let mut phys_origin = [0.0; 3];
        let mut phys_scale = [0.0; 3];
        let mut mpi_partition = [0u32; 3];
        for d in 0..3 {
            data_extents[d] = (f64_at(24 + d * 16), f64_at(32 + d * 16));
            phys_origin[d] = f64_at(72 + d * 8);
            phys_scale[d] = f64_at(96 + d * 8);
            mpi_partition[d] = u32_at(120 + d * 4);
        }

        Ok(Self {
            version: u16::from_le_bytes(buf[8..10].try_into().unwrap()),
            column_count: u16::from_le_bytes(buf[10..12].try_into().unwrap()),
            num_elems: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            data_extents,
            phys_origin,
            phys_scale,
            mpi_partition,
        })
    }
}

// ── Column table entry ──────────────────────────────────────────────────────

/// Locates and describes one named column payload.
#[derive(Debug, Clone)]
pub struct ColumnEntry {
    /// Column name, at most 8 bytes.
    pub name: String,
    pub type_id: u16,
    pub flags: u16,
    /// Byte offset of the payload from the start of the file.
    pub offset: u64,
    /// Payload length in bytes.
    pub len_bytes: u64,
    /// xxhash3-64 of the payload bytes.
    pub checksum: u64,
}

impl ColumnEntry {
    /// Serialize to exactly `COLUMN_ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> Result<[u8; COLUMN_ENTRY_SIZE as usize]> {
        let name = self.name.as_bytes();
        if name.len() > 8 {
            return Err(DgcError::SnapshotFormat(format!(
                "column name '{}' exceeds 8 bytes",
                self.name
            )));
        }
        let mut buf = [0u8; COLUMN_ENTRY_SIZE as usize];
        buf[..name.len()].copy_from_slice(name);
        buf[8..10].copy_from_slice(&self.type_id.to_le_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        // buf[12..16] padding
        buf[16..24].copy_from_slice(&self.offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.len_bytes.to_le_bytes());
        buf[32..40].copy_from_slice(&self.checksum.to_le_bytes());
        Ok(buf)
    }

    /// Deserialize from `COLUMN_ENTRY_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; COLUMN_ENTRY_SIZE as usize]) -> Result<Self> {
        let name_end = buf[..8].iter().position(|&b| b == 0).unwrap_or(8);
        let name = std::str::from_utf8(&buf[..name_end])
            .map_err(|_| DgcError::SnapshotFormat("column name is not UTF-8".into()))?
            .to_string();
        Ok(Self {
            name,
            type_id: u16::from_le_bytes(buf[8..10].try_into().unwrap()),
            flags: u16::from_le_bytes(buf[10..12].try_into().unwrap()),
            offset: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            len_bytes: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            checksum: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = SnapshotHeader {
            version: 1,
            column_count: 7,
            num_elems: 1000,
            data_extents: [(0.0, 64.0), (0.0, 64.0), (-1.0, 1.0)],
            phys_origin: [0.0, 0.0, -1.0],
            phys_scale: [64.0, 64.0, 2.0],
            mpi_partition: [1, 1, 1],
        };
        let decoded = SnapshotHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.column_count, 7);
        assert_eq!(decoded.num_elems, 1000);
        assert_eq!(decoded.data_extents[2], (-1.0, 1.0));
        assert_eq!(decoded.phys_scale, [64.0, 64.0, 2.0]);
        assert_eq!(decoded.mpi_partition, [1, 1, 1]);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = [0u8; HEADER_SIZE as usize];
        assert!(SnapshotHeader::from_bytes(&buf).is_err());
    }

    #[test]
    fn column_entry_roundtrip() {
        let entry = ColumnEntry {
            name: "vx".into(),
            type_id: TYPE_F32,
            flags: VAR_HAS_EXTRA_SPACE,
            offset: 144,
            len_bytes: 4000,
            checksum: 0xDEAD_BEEF,
        };
        let decoded = ColumnEntry::from_bytes(&entry.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.name, "vx");
        assert_eq!(decoded.type_id, TYPE_F32);
        assert_eq!(decoded.flags, VAR_HAS_EXTRA_SPACE);
        assert_eq!(decoded.len_bytes, 4000);
        assert_eq!(decoded.checksum, 0xDEAD_BEEF);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let entry = ColumnEntry {
            name: "muchtoolong".into(),
            type_id: TYPE_F32,
            flags: 0,
            offset: 0,
            len_bytes: 0,
            checksum: 0,
        };
        assert!(entry.to_bytes().is_err());
    }
}
