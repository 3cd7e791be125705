//! Density-guided lossy compression for N-body particle snapshots.
//!
//! Particles are classified by the mass density of their containing grid
//! cell and grouped into buckets of comparable density; a lossy kernel then
//! runs per bucket with a bucket-specific bit budget, so dense,
//! dynamically important regions keep more precision than voids. The
//! decompressed streams are reassembled, identity intact, into an output
//! snapshot.

pub mod binning;
pub mod bucket;
pub mod codec;
pub mod comm;
pub mod config;
pub mod density;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod snapshot;

pub use codec::{Kernel, Layout};
pub use comm::{Collectives, ReduceOp, SingleProcess};
pub use config::RunConfig;
pub use driver::Driver;
pub use error::{DgcError, Result};
