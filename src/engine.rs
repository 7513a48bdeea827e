// Engine: ties the codec to secondary compression.
//
// Provides high-level encode/decode APIs that orchestrate:
//   - Delta-of-delta encoding (codec module) to produce the raw stream
//   - Optional wrapping through a secondary backend (compress module)
//   - Transparent unwrapping before decode
//
// This is the first layer that logs; the codec below it stays silent.

use std::borrow::Cow;

use log::{debug, trace};

use crate::buffer::{BufferAllocator, HeapAllocator};
use crate::codec::{self, BucketHistogram, Header};
use crate::compress::frame;
use crate::compress::secondary::SecondaryCompression;
use crate::error::CompressError;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Encode options
// ---------------------------------------------------------------------------

/// Configuration for encoding.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Secondary compression applied to the codec stream. Default: none.
    pub secondary: SecondaryCompression,
}

impl EncodeOptions {
    pub fn with_secondary(secondary: SecondaryCompression) -> Self {
        Self { secondary }
    }
}

/// Everything an encode produced, for callers that report on it.
#[derive(Debug, Clone)]
pub struct EncodeSummary {
    /// Final output: the raw stream, or its wrapped frame.
    pub bytes: Vec<u8>,
    /// Size of the raw codec stream before any wrapping.
    pub codec_len: usize,
    pub header: Header,
    pub histogram: BucketHistogram,
    /// Backend id when the output is a wrapped frame.
    pub secondary_id: Option<u8>,
}

// ---------------------------------------------------------------------------
// High-level encode
// ---------------------------------------------------------------------------

/// Encode `values` with default options (no secondary compression).
pub fn encode(values: &[i64]) -> Result<Vec<u8>, CompressError> {
    encode_with_options(values, &EncodeOptions::default())
}

/// Encode with custom options.
pub fn encode_with_options(values: &[i64], opts: &EncodeOptions) -> Result<Vec<u8>, CompressError> {
    encode_summary(values, opts).map(|summary| summary.bytes)
}

/// Encode and report sizes, header and class histogram.
pub fn encode_summary(values: &[i64], opts: &EncodeOptions) -> Result<EncodeSummary, CompressError> {
    let out = codec::encode_detailed(values, &HeapAllocator)?;
    let header = Header::parse(&out.bytes)?;
    let codec_len = out.bytes.len();
    debug!(
        "encoded {} values into {} bytes ({:?} count width)",
        values.len(),
        codec_len,
        header.width
    );
    for (bucket, count) in out.histogram.iter().filter(|(_, n)| *n > 0) {
        trace!("  {bucket:?}: {count}");
    }

    let (bytes, secondary_id) = match opts.secondary.backend() {
        Some(backend) => {
            let bytes = frame::wrap(&out.bytes, backend.as_ref())?;
            let id = frame::is_wrapped(&bytes).then(|| backend.id());
            (bytes, id)
        }
        None => (out.bytes, None),
    };

    Ok(EncodeSummary {
        bytes,
        codec_len,
        header,
        histogram: out.histogram,
        secondary_id,
    })
}

/// Encode several independent series with the same options.
///
/// Results come back in input order. With the `parallel` feature each series
/// is encoded on the rayon pool.
pub fn encode_batch<S>(series: &[S], opts: &EncodeOptions) -> Vec<Result<Vec<u8>, CompressError>>
where
    S: AsRef<[i64]> + Sync,
{
    debug!("batch encode of {} series", series.len());

    #[cfg(feature = "parallel")]
    {
        series
            .par_iter()
            .map(|s| encode_with_options(s.as_ref(), opts))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        series
            .iter()
            .map(|s| encode_with_options(s.as_ref(), opts))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// High-level decode
// ---------------------------------------------------------------------------

/// Decode a raw or wrapped stream.
pub fn decode(data: &[u8]) -> Result<Vec<i64>, CompressError> {
    decode_with(data, &HeapAllocator)
}

/// Decode a raw or wrapped stream, obtaining the output from `alloc`.
///
/// A wrapped body is restored through `alloc` as well, so its budget also
/// caps how far a compressed frame may expand.
pub fn decode_with<A: BufferAllocator>(data: &[u8], alloc: &A) -> Result<Vec<i64>, CompressError> {
    let raw = frame::unwrap_in(data, alloc)?;
    if let Cow::Owned(ref restored) = raw {
        debug!("unwrapped {} -> {} bytes", data.len(), restored.len());
    }
    let values = codec::decode_with(&raw, alloc)?;
    debug!("decoded {} values from {} bytes", values.len(), data.len());
    Ok(values)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
