//! LZ4 kernel: fastest lossless option for the chained stage.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use dgc_core::{DgcError, Kernel, Layout, Result};

pub struct Lz4Kernel;

impl Kernel for Lz4Kernel {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn init(&mut self) {}

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
        Err(DgcError::BadParameter {
            codec: "lz4",
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn compress(&self, raw: &[u8], _layout: &Layout) -> Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8], layout: &Layout) -> Result<Vec<u8>> {
        let raw = decompress_size_prepended(compressed)
            .map_err(|e| DgcError::CodecInternal(format!("lz4 decompress: {e}")))?;
        if raw.len() != layout.raw_len() {
            return Err(DgcError::CodecInternal(format!(
                "lz4 decompressed to {} bytes, expected {}",
                raw.len(),
                layout.raw_len()
            )));
        }
        Ok(raw)
    }
}
