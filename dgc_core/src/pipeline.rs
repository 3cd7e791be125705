//! Compression pipeline: per-axis, per-bucket lossy round trip.
//!
//! For one coordinate axis, every non-empty bucket is gathered into a
//! contiguous dataset, compressed with the bucket's bit budget, immediately
//! decompressed, and appended to the axis output stream in bucket-traversal
//! order. An optional lossless kernel is chained after the lossy stage for
//! size accounting only: the reconstructed stream always derives from the
//! lossy blob.

use tracing::debug;

use crate::bucket::Buckets;
use crate::codec::{Kernel, Layout};
use crate::error::{DgcError, Result};

/// Per-rank byte totals for one processed axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisStats {
    /// Uncompressed payload size.
    pub raw_bytes: u64,
    /// Bytes produced by the lossy stage.
    pub lossy_bytes: u64,
    /// Bytes after the chained lossless stage, when one is configured.
    pub chain_bytes: Option<u64>,
}

/// Run one coordinate axis through the lossy round trip.
///
/// The returned stream has exactly `axis_data.len()` elements; element `k`
/// belongs to the particle at the k-th position of the flat bucket
/// traversal.
pub fn process_axis(
    axis_data: &[f32],
    buckets: &Buckets,
    bits: &[u32],
    lossy: &mut dyn Kernel,
    mut chain: Option<&mut dyn Kernel>,
) -> Result<(Vec<f32>, AxisStats)> {
    let local_particles = axis_data.len();
    let mut stream = Vec::with_capacity(local_particles);
    let mut stats = AxisStats {
        raw_bytes: (local_particles * 4) as u64,
        lossy_bytes: 0,
        chain_bytes: chain.is_some().then_some(0),
    };

    for bin in 0..buckets.nb_bins() {
        let indices = buckets.list(bin);
        if indices.is_empty() {
            continue;
        }

        let dataset: Vec<f32> = indices.iter().map(|&i| axis_data[i]).collect();
        let layout = Layout::f32(dataset.len());

        lossy.init();
        lossy.set_parameter("bits", &bits[bin].to_string())?;
        let blob = lossy.compress(bytemuck::cast_slice(&dataset), &layout)?;
        stats.lossy_bytes += blob.len() as u64;
        debug!(
            bucket = bin,
            particles = dataset.len(),
            bits = bits[bin],
            lossy_bytes = blob.len(),
            "bucket compressed"
        );

        // The chained stage measures how much further the lossy blob
        // shrinks; its output is never decoded.
        if let Some(kernel) = chain.as_deref_mut() {
            kernel.init();
            let chained = kernel.compress(&blob, &Layout::bytes(blob.len()))?;
            if let Some(total) = stats.chain_bytes.as_mut() {
                *total += chained.len() as u64;
            }
        }

        let restored = lossy.decompress(&blob, &layout)?;
        if restored.len() != layout.raw_len() {
            return Err(DgcError::CodecInternal(format!(
                "lossy kernel returned {} bytes for {} elements",
                restored.len(),
                layout.count
            )));
        }
        stream.extend(bytemuck::pod_collect_to_vec::<u8, f32>(&restored));
    }

    if stream.len() != local_particles {
        return Err(DgcError::Invariant(format!(
            "axis stream holds {} elements, expected {}",
            stream.len(),
            local_particles
        )));
    }
    Ok((stream, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::BinPartition;
    use crate::bucket::bucket_particles;
    use crate::density::DensityField;

    /// Identity kernel: stores the payload verbatim. Accepts `bits` so it
    /// can stand in for the lossy stage.
    struct IdentityKernel;

    impl Kernel for IdentityKernel {
        fn name(&self) -> &'static str {
            "identity"
        }

        fn init(&mut self) {}

        fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
            match key {
                "bits" => Ok(()),
                _ => Err(DgcError::BadParameter {
                    codec: "identity",
                    key: key.into(),
                    value: value.into(),
                }),
            }
        }

        fn compress(&self, raw: &[u8], _layout: &Layout) -> Result<Vec<u8>> {
            Ok(raw.to_vec())
        }

        fn decompress(&self, compressed: &[u8], _layout: &Layout) -> Result<Vec<u8>> {
            Ok(compressed.to_vec())
        }
    }

    fn two_bucket_fixture() -> (Vec<f32>, Buckets) {
        let n = 64;
        let x: Vec<f32> = (0..n).map(|i| (i as f32 + 0.5) / 8.0).collect();
        let y = vec![0.1f32; n];
        let z = vec![0.1f32; n];
        let density = DensityField::from_values(
            (0..512).map(|c| if c % 8 < 4 { 0.0 } else { 3.0 }).collect(),
        );
        let partition = BinPartition::fixed(2);
        let buckets = bucket_particles(
            [&x, &y, &z],
            [0.0; 3],
            [8.0; 3],
            8,
            &density,
            &partition,
            0.0,
            3.0,
        )
        .unwrap();
        (x, buckets)
    }

    #[test]
    fn identity_kernel_reproduces_gather_order() {
        let (x, buckets) = two_bucket_fixture();
        let bits = vec![16u32, 24];

        let mut lossy = IdentityKernel;
        let (stream, stats) = process_axis(&x, &buckets, &bits, &mut lossy, None).unwrap();

        assert_eq!(stream.len(), x.len());
        let expected: Vec<f32> = buckets.iter_flat().map(|i| x[i]).collect();
        assert_eq!(stream, expected);
        assert_eq!(stats.raw_bytes, 64 * 4);
        assert_eq!(stats.lossy_bytes, 64 * 4);
        assert!(stats.chain_bytes.is_none());
    }

    #[test]
    fn chain_stage_only_accounts_bytes() {
        let (x, buckets) = two_bucket_fixture();
        let bits = vec![16u32, 24];

        let mut lossy = IdentityKernel;
        let mut chain = IdentityKernel;
        let (stream, stats) =
            process_axis(&x, &buckets, &bits, &mut lossy, Some(&mut chain)).unwrap();

        // Chained output is measured, never decoded back into the stream.
        let expected: Vec<f32> = buckets.iter_flat().map(|i| x[i]).collect();
        assert_eq!(stream, expected);
        assert_eq!(stats.chain_bytes, Some(64 * 4));
    }

    #[test]
    fn empty_buckets_are_skipped() {
        let x = vec![0.5f32; 10];
        let y = vec![0.5f32; 10];
        let z = vec![0.5f32; 10];
        let density = DensityField::from_values(vec![1.0; 512]);
        let partition = BinPartition::fixed(4);
        let buckets = bucket_particles(
            [&x, &y, &z],
            [0.0; 3],
            [8.0; 3],
            8,
            &density,
            &partition,
            1.0,
            1.0,
        )
        .unwrap();
        assert_eq!(buckets.list(0).len(), 10);

        let bits = vec![16u32; 4];
        let mut lossy = IdentityKernel;
        let (stream, _) = process_axis(&x, &buckets, &bits, &mut lossy, None).unwrap();
        assert_eq!(stream.len(), 10);
    }
}
