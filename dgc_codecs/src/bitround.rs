//! Lossy fixed-budget float kernel.
//!
//! Each f32 bit pattern is rounded (half to even) at the cut that keeps the
//! top `bits` bits — sign, exponent, and the high mantissa bits — and the
//! kept bits are packed contiguously, so a bucket compresses to
//! `bits / 32` of its raw size. For `bits ≥ 10` the maximum relative error
//! is bounded by `2^-(bits-9)`; `bits = 32` stores patterns verbatim.

use bitvec::prelude::*;

use dgc_core::{DgcError, Kernel, Layout, Result};

const DEFAULT_BITS: u32 = 32;

/// Blob prefix: `bits:u8` then `count:u64 LE`, followed by the packed bits.
const BLOB_HEADER: usize = 9;

pub struct BitroundKernel {
    bits: u32,
}

impl Default for BitroundKernel {
    fn default() -> Self {
        Self { bits: DEFAULT_BITS }
    }
}

/// Round a bit pattern half-to-even at `maskbits = 32 - keepbits`, the
/// scheme bitround codecs use. Rounding that would carry past the top bit
/// falls back to truncation.
fn round_bits32(input: u32, keepbits: u32) -> u32 {
    if keepbits >= 32 {
        return input;
    }
    let maskbits = 32 - keepbits;
    let mask = (u32::MAX >> maskbits) << maskbits;
    let half_quantum1 = (1u32 << (maskbits - 1)) - 1;
    match input.checked_add(((input >> maskbits) & 1) + half_quantum1) {
        Some(rounded) => rounded & mask,
        None => input & mask,
    }
}

impl Kernel for BitroundKernel {
    fn name(&self) -> &'static str {
        "bitround"
    }

    fn init(&mut self) {
        self.bits = DEFAULT_BITS;
    }

    fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
        let reject = || DgcError::BadParameter {
            codec: "bitround",
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "bits" => {
                let bits: u32 = value.parse().map_err(|_| reject())?;
                if !(1..=32).contains(&bits) {
                    return Err(reject());
                }
                self.bits = bits;
                Ok(())
            }
            _ => Err(reject()),
        }
    }

    fn compress(&self, raw: &[u8], layout: &Layout) -> Result<Vec<u8>> {
        if layout.elem_bytes != 4 || raw.len() != layout.raw_len() {
            return Err(DgcError::CodecInternal(format!(
                "bitround expects {} bytes of f32 data, got {}",
                layout.raw_len(),
                raw.len()
            )));
        }
        let width = self.bits as usize;
        let shift = 32 - self.bits;

        let mut packed = BitVec::<u8, Lsb0>::with_capacity(layout.count * width);
        for chunk in raw.chunks_exact(4) {
            let pattern = u32::from_le_bytes(chunk.try_into().unwrap());
            let kept = round_bits32(pattern, self.bits) >> shift;
            for b in 0..width {
                packed.push(kept & (1 << b) != 0);
            }
        }

        let mut blob = Vec::with_capacity(BLOB_HEADER + packed.len() / 8 + 1);
        blob.push(self.bits as u8);
        blob.extend_from_slice(&(layout.count as u64).to_le_bytes());
        blob.extend_from_slice(&packed.into_vec());
        Ok(blob)
    }

    fn decompress(&self, compressed: &[u8], layout: &Layout) -> Result<Vec<u8>> {
        if compressed.len() < BLOB_HEADER {
            return Err(DgcError::CodecInternal("bitround blob truncated".into()));
        }
        let bits = compressed[0] as u32;
        if !(1..=32).contains(&bits) {
            return Err(DgcError::CodecInternal(format!(
                "bitround blob declares invalid bit width {bits}"
            )));
        }
        let count = u64::from_le_bytes(compressed[1..9].try_into().unwrap()) as usize;
        if count != layout.count {
            return Err(DgcError::CodecInternal(format!(
                "bitround blob holds {count} elements, caller expects {}",
                layout.count
            )));
        }

        let width = bits as usize;
        let shift = 32 - bits;
        let packed = compressed[BLOB_HEADER..].view_bits::<Lsb0>();
        if packed.len() < count * width {
            return Err(DgcError::CodecInternal("bitround blob truncated".into()));
        }

        let mut raw = Vec::with_capacity(count * 4);
        for chunk in packed.chunks(width).take(count) {
            let mut container = 0u32;
            for pos in chunk.iter_ones() {
                container |= 1u32 << pos;
            }
            raw.extend_from_slice(&(container << shift).to_le_bytes());
        }
        Ok(raw)
    }
}
