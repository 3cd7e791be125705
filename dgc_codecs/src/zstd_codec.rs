//! Zstandard kernel.
//!
//! Lossless byte kernel, used as the chained stage that measures how much
//! further an already-lossy blob compresses. Recognizes the `level`
//! parameter (1–22, default 3).

use dgc_core::{DgcError, Kernel, Layout, Result};

const DEFAULT_LEVEL: i32 = 3;

pub struct ZstdKernel {
    level: i32,
}

impl Default for ZstdKernel {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl Kernel for ZstdKernel {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn init(&mut self) {
        self.level = DEFAULT_LEVEL;
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
        let reject = || DgcError::BadParameter {
            codec: "zstd",
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "level" => {
                let level: i32 = value.parse().map_err(|_| reject())?;
                if !(1..=22).contains(&level) {
                    return Err(reject());
                }
                self.level = level;
                Ok(())
            }
            _ => Err(reject()),
        }
    }

    fn compress(&self, raw: &[u8], _layout: &Layout) -> Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level)
            .map_err(|e| DgcError::CodecInternal(format!("zstd compress: {e}")))
    }

    fn decompress(&self, compressed: &[u8], layout: &Layout) -> Result<Vec<u8>> {
        let raw = zstd::decode_all(compressed)
            .map_err(|e| DgcError::CodecInternal(format!("zstd decompress: {e}")))?;
        if raw.len() != layout.raw_len() {
            return Err(DgcError::CodecInternal(format!(
                "zstd decompressed to {} bytes, expected {}",
                raw.len(),
                layout.raw_len()
            )));
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_exact() {
        let data: Vec<u8> = (0..4096u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
        let kernel = ZstdKernel::default();
        let layout = Layout::bytes(data.len());
        let blob = kernel.compress(&data, &layout).unwrap();
        assert!(blob.len() < data.len(), "repetitive input should shrink");
        assert_eq!(kernel.decompress(&blob, &layout).unwrap(), data);
    }

    #[test]
    fn level_is_validated() {
        let mut kernel = ZstdKernel::default();
        kernel.set_parameter("level", "19").unwrap();
        assert!(kernel.set_parameter("level", "0").is_err());
        assert!(kernel.set_parameter("bits", "24").is_err());
    }
}
