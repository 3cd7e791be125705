//! No-op kernel: stores payloads verbatim.
//!
//! Used by tests to verify the pipeline permutation independently of any
//! real codec — a passthrough round trip must reproduce its input
//! bit-identically.

use dgc_core::{DgcError, Kernel, Layout, Result};

pub struct PassthroughKernel;

impl Kernel for PassthroughKernel {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn init(&mut self) {}

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
        // Accepts (and ignores) the lossy `bits` budget so it can stand in
        // for the lossy stage.
        match key {
            "bits" => Ok(()),
            _ => Err(DgcError::BadParameter {
                codec: "passthrough",
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn compress(&self, raw: &[u8], _layout: &Layout) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8], layout: &Layout) -> Result<Vec<u8>> {
        if compressed.len() != layout.raw_len() {
            return Err(DgcError::CodecInternal(format!(
                "passthrough blob holds {} bytes, expected {}",
                compressed.len(),
                layout.raw_len()
            )));
        }
        Ok(compressed.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_identity() {
        let data = vec![1u8, 2, 3, 4];
        let kernel = PassthroughKernel;
        let layout = Layout::bytes(4);
        let blob = kernel.compress(&data, &layout).unwrap();
        assert_eq!(kernel.decompress(&blob, &layout).unwrap(), data);
    }
}
