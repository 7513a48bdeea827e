// Delta-of-delta encoder.
//
// Output layout:
//
//   [indicator][count: 1-3 bytes LE][v0: 8 bytes LE][v1 - v0: 8 bytes LE][bitstream]
//
// The bitstream carries one size-classed code per element from index 2 on.
// All arithmetic on deltas is done in i128 and narrowed with a check, so an
// input whose differences do not fit in 64 bits is rejected instead of being
// silently wrapped.

use crate::buffer::{BufferAllocator, HeapAllocator};
use crate::error::CodecError;

use super::bits::BitWriter;
use super::bucket::{Bucket, BucketHistogram};
use super::header::{CountWidth, Header};

/// Bytes taken by the raw first value and first delta.
pub const PREAMBLE_LEN: usize = 16;

/// Result of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    /// The encoded stream, trimmed to its exact length.
    pub bytes: Vec<u8>,
    /// Double-delta class counts for elements 2..N.
    pub histogram: BucketHistogram,
}

/// Encode `values` using the global heap.
pub fn encode(values: &[i64]) -> Result<Vec<u8>, CodecError> {
    encode_with(values, &HeapAllocator)
}

/// Encode `values`, obtaining the output buffer from `alloc`.
pub fn encode_with<A: BufferAllocator>(values: &[i64], alloc: &A) -> Result<Vec<u8>, CodecError> {
    encode_detailed(values, alloc).map(|out| out.bytes)
}

/// Encode `values` and also report how the double-deltas were classified.
pub fn encode_detailed<A: BufferAllocator>(
    values: &[i64],
    alloc: &A,
) -> Result<EncodeOutput, CodecError> {
    let header = Header::for_count(values.len())?;
    let (v0, v1) = match values {
        [v0, v1, ..] => (*v0, *v1),
        _ => {
            return Err(CodecError::TooFewValues {
                count: values.len(),
            });
        }
    };
    let first_delta = narrow(i128::from(v1) - i128::from(v0), 1)?;

    let mut out = alloc.allocate::<u8>(capacity_hint(&header))?;
    let mut offset = header.write_to(&mut out)?;

    let len = out.len();
    let preamble = out
        .get_mut(offset..offset + PREAMBLE_LEN)
        .ok_or(CodecError::OutOfBounds { offset, len })?;
    preamble[..8].copy_from_slice(&v0.to_le_bytes());
    preamble[8..].copy_from_slice(&first_delta.to_le_bytes());
    offset += PREAMBLE_LEN;

    let mut histogram = BucketHistogram::default();
    let mut writer = BitWriter::new(&mut out[offset..]);
    for (i, window) in values.windows(3).enumerate() {
        let dd = double_delta(window[0], window[1], window[2], i + 2)?;
        let bucket = Bucket::classify(dd);
        write_code(&mut writer, bucket, dd)?;
        histogram.record(bucket);
    }
    writer.flush()?;
    let used = offset + writer.position();

    let bytes = alloc.resize(out, used)?;
    Ok(EncodeOutput { bytes, histogram })
}

/// Upper bound used for the initial allocation: header plus 1.2x the raw size.
///
/// Every class costs at most 70 bits (8.75 bytes) per element, and the
/// preamble 16 bytes for the first two, so 9.6 bytes per element always fits.
fn capacity_hint(header: &Header) -> usize {
    header.encoded_len() + header.count * 8 * 6 / 5
}

/// Largest stream `count` values can encode to behind a `width` count field:
/// every element after the first two in the widest class.
pub fn max_encoded_len(width: CountWidth, count: usize) -> usize {
    let worst_bits = count.saturating_sub(2) * Bucket::Full.encoded_bits() as usize;
    1 + width.bytes() + PREAMBLE_LEN + worst_bits.div_ceil(8)
}

/// `v2 - 2*v1 + v0`, rejected if it does not fit the 63-bit magnitude payload.
fn double_delta(v0: i64, v1: i64, v2: i64, index: usize) -> Result<i64, CodecError> {
    let dd = i128::from(v2) - 2 * i128::from(v1) + i128::from(v0);
    narrow(dd, index)
}

/// Narrow to i64, excluding `i64::MIN` whose magnitude needs a 64th bit.
fn narrow(value: i128, index: usize) -> Result<i64, CodecError> {
    match i64::try_from(value) {
        Ok(v) if v != i64::MIN => Ok(v),
        _ => Err(CodecError::TruncationRisk { index }),
    }
}

fn write_code(writer: &mut BitWriter<'_>, bucket: Bucket, dd: i64) -> Result<(), CodecError> {
    writer.write_bits(bucket.control(), bucket.control_len())?;
    let width = bucket.payload_bits();
    if width > 0 {
        writer.write_bits(u8::from(dd < 0), 1)?;
        writer.write_bits64(dd.unsigned_abs(), width)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedAllocator;
    use crate::codec::header::MAX_COUNT;

    const PREFIX_123: [u8; 18] = [
        0x11, 0x03, //
        0x01, 0, 0, 0, 0, 0, 0, 0, //
        0x01, 0, 0, 0, 0, 0, 0, 0,
    ];

    #[test]
    fn zero_double_delta() {
        let out = encode(&[1, 2, 3]).unwrap();
        assert_eq!(&out[..18], &PREFIX_123);
        assert_eq!(&out[18..], &[0x00]);
    }

    #[test]
    fn negative_tiny_double_delta() {
        let out = encode(&[1, 2, 1]).unwrap();
        assert_eq!(&out[..18], &PREFIX_123);
        assert_eq!(&out[18..], &[0xA1, 0x00]);
    }

    #[test]
    fn two_values_have_no_bitstream() {
        let out = encode(&[10, 7]).unwrap();
        assert_eq!(out.len(), 18);
        assert_eq!(&out[10..18], &(-3i64).to_le_bytes());
    }

    #[test]
    fn too_few_values() {
        assert_eq!(encode(&[]), Err(CodecError::TooFewValues { count: 0 }));
        assert_eq!(encode(&[5]), Err(CodecError::TooFewValues { count: 1 }));
    }

    #[test]
    fn size_overflow_checked_before_work() {
        let values = vec![0i64; MAX_COUNT + 1];
        assert_eq!(
            encode(&values),
            Err(CodecError::SizeOverflow {
                count: MAX_COUNT + 1
            })
        );
    }

    #[test]
    fn first_delta_overflow() {
        assert_eq!(
            encode(&[i64::MIN, i64::MAX]),
            Err(CodecError::TruncationRisk { index: 1 })
        );
        assert_eq!(
            encode(&[1, i64::MIN]),
            Err(CodecError::TruncationRisk { index: 1 })
        );
    }

    #[test]
    fn double_delta_overflow() {
        // 0 - 2 * MIN + 0 = 2^64
        assert_eq!(
            encode(&[0, i64::MIN, 0]),
            Err(CodecError::TruncationRisk { index: 2 })
        );
    }

    #[test]
    fn double_delta_of_i64_min_is_rejected() {
        // MIN - 0 + 0: fits i64 but its magnitude needs 64 bits.
        assert_eq!(
            encode(&[0, 0, i64::MIN]),
            Err(CodecError::TruncationRisk { index: 2 })
        );
    }

    #[test]
    fn extreme_but_representable() {
        let out = encode(&[0, 0, i64::MAX]).unwrap();
        // 70 bits of Full-class code.
        assert_eq!(out.len(), 18 + 9);
    }

    #[test]
    fn constant_series_is_one_bit_per_value() {
        let values = vec![42i64; 1002];
        let out = encode_detailed(&values, &HeapAllocator).unwrap();
        assert_eq!(out.bytes.len(), 1 + 2 + 16 + 1000 / 8);
        assert!(out.bytes[19..].iter().all(|&b| b == 0));
        assert_eq!(out.histogram.get(Bucket::Zero), 1000);
        assert_eq!(out.histogram.total(), 1000);
    }

    #[test]
    fn output_is_trimmed_to_exact_length() {
        let values: Vec<i64> = (0..500).map(|i| i * i).collect();
        let out = encode(&values).unwrap();
        // Second difference of i^2 is constant 2: a Tiny code (9 bits) each.
        assert_eq!(out.len(), 1 + 2 + 16 + (498 * 9usize).div_ceil(8));
    }

    #[test]
    fn worst_case_fits_capacity_hint() {
        // Alternating extremes force a Full code for every element.
        let values: Vec<i64> = (0..64)
            .map(|i| if i % 2 == 0 { i64::MAX / 4 } else { -(i64::MAX / 4) })
            .collect();
        let out = encode_detailed(&values, &HeapAllocator).unwrap();
        assert_eq!(out.histogram.get(Bucket::Full), 62);
        assert_eq!(out.bytes.len(), 1 + 1 + 16 + (62 * 70usize).div_ceil(8));
    }

    #[test]
    fn allocator_failure_is_reported() {
        let values = vec![1i64; 100];
        let err = encode_with(&values, &BoundedAllocator::new(64)).unwrap_err();
        assert!(matches!(err, CodecError::AllocationFailure(_)));
    }

    #[test]
    fn max_encoded_len_bounds_widest_stream() {
        let values = [0, 0, 1 << 40, 0];
        let data = encode(&values).unwrap();
        assert_eq!(data.len(), max_encoded_len(CountWidth::One, 4));
        assert_eq!(max_encoded_len(CountWidth::One, 255), 2232);
        assert_eq!(max_encoded_len(CountWidth::Two, 2), 19);
    }

}
