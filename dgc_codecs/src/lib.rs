mod bitround;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use bitround::BitroundKernel;
pub use lz4_codec::Lz4Kernel;
pub use passthrough::PassthroughKernel;
pub use zstd_codec::ZstdKernel;

use dgc_core::{DgcError, Kernel, Result};

/// Resolve a kernel from its registry name.
///
/// `bitround` is the lossy fixed-budget float kernel driven by the `bits`
/// parameter; `zstd` and `lz4` are the lossless byte kernels used as
/// chained stages; `passthrough` stores payloads verbatim.
pub fn create(name: &str) -> Result<Box<dyn Kernel>> {
    match name {
        "bitround" => Ok(Box::new(BitroundKernel::default())),
        "zstd" => Ok(Box::new(ZstdKernel::default())),
        "lz4" => Ok(Box::new(Lz4Kernel)),
        "passthrough" | "pass" | "none" => Ok(Box::new(PassthroughKernel)),
        other => Err(DgcError::UnknownCodec(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_names() {
        for name in ["bitround", "zstd", "lz4", "passthrough"] {
            assert_eq!(create(name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(create("brotli"), Err(DgcError::UnknownCodec(_))));
    }
}
