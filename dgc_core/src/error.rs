//! The single, unified error type for the whole dgc pipeline.
//!
//! Every failure aborts the run: errors are surfaced to the driver, never
//! retried and never swallowed. The variants mirror the failure kinds a run
//! can hit, from config validation through codec invocation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DgcError>;

#[derive(Error, Debug)]
pub enum DgcError {
    /// Missing key, non-positive count, bit budget out of order, bad extents.
    /// Raised during startup validation, before any data I/O.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The density file list cannot be split evenly across the ranks.
    #[error("density partition of {files} files cannot be split across {ranks} ranks")]
    RankPartitionMismatch { files: usize, ranks: usize },

    /// A codec name the registry does not know.
    #[error("unknown codec '{0}'")]
    UnknownCodec(String),

    /// A kernel rejected a parameter key or value.
    #[error("codec '{codec}' rejected parameter {key}={value}")]
    BadParameter {
        codec: &'static str,
        key: String,
        value: String,
    },

    /// A kernel failed internally during compress or decompress.
    #[error("codec failure: {0}")]
    CodecInternal(String),

    /// A design invariant was violated at runtime (e.g. a cell index fell
    /// outside the density field). Always a bug or corrupt input.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A particle snapshot file that cannot be parsed as PTC1.
    #[error("snapshot format error: {0}")]
    SnapshotFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
