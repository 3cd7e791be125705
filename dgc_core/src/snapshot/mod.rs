//! PTC1 particle container: the snapshot I/O adapter.
//!
//! A PTC1 file is a self-describing columnar particle snapshot: a fixed
//! little-endian header (element count, per-axis data extents, physical
//! origin/scale, rank partition vector), a column table, then one
//! checksummed payload per named column (`x`, `y`, `z`, `vx`, `vy`, `vz`,
//! `id`).

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{
    ColumnEntry, SnapshotHeader, COLUMN_ENTRY_SIZE, HEADER_SIZE, MAGIC, TYPE_F32, TYPE_I64,
    VAR_HAS_EXTRA_SPACE, VAR_IS_PHYS_COORD_X, VAR_IS_PHYS_COORD_Y, VAR_IS_PHYS_COORD_Z,
};
pub use reader::{ColumnData, SnapshotReader};
pub use writer::SnapshotWriter;
