// Delta-of-delta decoder.
//
// Mirrors `encoder`: parse the header, take v0 and the first delta from the
// raw preamble, then rebuild every later element from its double-delta code.
// All reads go through the bounds-checked `BitReader`, and the declared count
// is checked against the bitstream length before any output is allocated.

use crate::buffer::{AllocError, BufferAllocator, HeapAllocator};
use crate::error::CodecError;

use super::bits::BitReader;
use super::bucket::{Bucket, BucketHistogram};
use super::encoder::PREAMBLE_LEN;
use super::header::{Header, PayloadFlags};

// ---------------------------------------------------------------------------
// Stream layout
// ---------------------------------------------------------------------------

/// A validated view of an encoded stream, split into its parts.
#[derive(Debug, Clone, Copy)]
pub struct Stream<'a> {
    pub header: Header,
    pub first_value: i64,
    pub first_delta: i64,
    /// Packed double-delta codes for elements 2..N.
    pub bitstream: &'a [u8],
}

impl<'a> Stream<'a> {
    /// Parse and validate `data` as an integer-codec stream.
    pub fn parse(data: &'a [u8]) -> Result<Self, CodecError> {
        let header = Header::parse(data)?;
        check_payload(&header)?;

        if header.count < 2 {
            return Err(CodecError::TooFewValues {
                count: header.count,
            });
        }

        let start = header.encoded_len();
        let preamble = data
            .get(start..start + PREAMBLE_LEN)
            .ok_or_else(|| truncated(data))?;
        let (v0, d1) = preamble.split_at(8);
        let first_value = i64::from_le_bytes(v0.try_into().map_err(|_| truncated(data))?);
        let first_delta = i64::from_le_bytes(d1.try_into().map_err(|_| truncated(data))?);

        // Every element after the first two costs at least one bit.
        let bitstream = &data[start + PREAMBLE_LEN..];
        let min_bytes = (header.count - 2).div_ceil(8);
        if bitstream.len() < min_bytes {
            return Err(CodecError::OutOfBounds {
                offset: data.len(),
                len: start + PREAMBLE_LEN + min_bytes,
            });
        }

        Ok(Self {
            header,
            first_value,
            first_delta,
            bitstream,
        })
    }

    /// Iterator over the `(class, double-delta)` codes of elements 2..N.
    pub fn double_deltas(&self) -> DoubleDeltaIter<'a> {
        DoubleDeltaIter {
            reader: BitReader::new(self.bitstream),
            left: self.header.count - 2,
        }
    }
}

fn check_payload(header: &Header) -> Result<(), CodecError> {
    if header.payload == PayloadFlags::DELTA_I64 {
        return Ok(());
    }
    if header.payload.contains(PayloadFlags::WRAPPED) {
        return Err(CodecError::format(
            "stream is wrapped by a secondary compressor; unwrap it before decoding",
        ));
    }
    Err(CodecError::format(format!(
        "payload flags {:#06b} do not name the integer codec",
        header.payload.bits()
    )))
}

fn truncated(data: &[u8]) -> CodecError {
    CodecError::OutOfBounds {
        offset: data.len(),
        len: data.len(),
    }
}

// ---------------------------------------------------------------------------
// Double-delta iterator
// ---------------------------------------------------------------------------

/// Yields the decoded `(class, double-delta)` pair of each element from index 2.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct DoubleDeltaIter<'a> {
    reader: BitReader<'a>,
    left: usize,
}

impl DoubleDeltaIter<'_> {
    fn read_one(&mut self) -> Result<(Bucket, i64), CodecError> {
        let bucket = read_control(&mut self.reader)?;
        let width = bucket.payload_bits();
        if width == 0 {
            return Ok((bucket, 0));
        }
        let negative = self.reader.read_bits(1)? != 0;
        // At most 63 bits, so the cast cannot wrap.
        let magnitude = self.reader.read_bits64(width)? as i64;
        Ok((bucket, if negative { -magnitude } else { magnitude }))
    }

    /// Bytes of the bitstream touched so far.
    pub fn bytes_consumed(&self) -> usize {
        self.reader.bytes_consumed()
    }
}

impl Iterator for DoubleDeltaIter<'_> {
    type Item = Result<(Bucket, i64), CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        let item = self.read_one();
        self.left = if item.is_ok() { self.left - 1 } else { 0 };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.left))
    }
}

/// Read a unary control code: up to six bits, one class per leading `1`.
fn read_control(reader: &mut BitReader<'_>) -> Result<Bucket, CodecError> {
    for bucket in Bucket::ALL {
        if reader.read_bits(1)? == 0 {
            return Ok(bucket);
        }
    }
    Err(CodecError::format(format!(
        "control code longer than {} bits",
        Bucket::MAX_CONTROL_LEN
    )))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode `data` using the global heap.
pub fn decode(data: &[u8]) -> Result<Vec<i64>, CodecError> {
    decode_with(data, &HeapAllocator)
}

/// Decode `data`, obtaining the output buffer from `alloc`.
pub fn decode_with<A: BufferAllocator>(data: &[u8], alloc: &A) -> Result<Vec<i64>, CodecError> {
    let stream = Stream::parse(data)?;
    let count = stream.header.count;
    let mut out = alloc.allocate::<i64>(count)?;
    if out.len() != count {
        return Err(AllocError::new(
            count.saturating_mul(size_of::<i64>()),
            format!("allocator returned {} of {count} elements", out.len()),
        )
        .into());
    }

    // The encoder only accepts inputs whose true deltas fit, so two's-complement
    // wrapping here reproduces them exactly.
    let mut value = stream.first_value;
    let mut delta = stream.first_delta;
    out[0] = value;
    value = value.wrapping_add(delta);
    out[1] = value;

    for (slot, item) in out[2..].iter_mut().zip(stream.double_deltas()) {
        let (_, dd) = item?;
        delta = delta.wrapping_add(dd);
        value = value.wrapping_add(delta);
        *slot = value;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Summary of an encoded stream, gathered without materializing its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub header: Header,
    pub first_value: i64,
    pub first_delta: i64,
    /// Total size of the stream in bytes.
    pub encoded_len: usize,
    /// Bytes of packed double-delta codes.
    pub bitstream_len: usize,
    /// Bitstream bytes actually used by the codes.
    pub bitstream_used: usize,
    pub histogram: BucketHistogram,
}

/// Walk every code of `data` and summarize it.
pub fn inspect(data: &[u8]) -> Result<StreamInfo, CodecError> {
    let stream = Stream::parse(data)?;
    let mut histogram = BucketHistogram::default();
    let mut codes = stream.double_deltas();
    for item in codes.by_ref() {
        let (bucket, _) = item?;
        histogram.record(bucket);
    }
    Ok(StreamInfo {
        header: stream.header,
        first_value: stream.first_value,
        first_delta: stream.first_delta,
        encoded_len: data.len(),
        bitstream_len: stream.bitstream.len(),
        bitstream_used: codes.bytes_consumed(),
        histogram,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedAllocator;
    use crate::codec::encoder::encode;

    fn stream(tail: &[u8], count: u8) -> Vec<u8> {
        let mut data = vec![0x11, count];
        data.extend_from_slice(&1i64.to_le_bytes());
        data.extend_from_slice(&1i64.to_le_bytes());
        data.extend_from_slice(tail);
        data
    }

    #[test]
    fn decodes_fixtures() {
        assert_eq!(decode(&stream(&[0x00], 3)).unwrap(), vec![1, 2, 3]);
        assert_eq!(decode(&stream(&[0xA1, 0x00], 3)).unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn two_values_need_no_bitstream() {
        assert_eq!(decode(&stream(&[], 2)).unwrap(), vec![1, 2]);
    }

    #[test]
    fn roundtrip_mixed_classes() {
        let values = vec![
            0,
            10,
            25,
            25,
            -300,
            5_000,
            i32::MAX as i64 * 3,
            -(i64::MAX / 8),
            7,
            7,
            8,
        ];
        let data = encode(&values).unwrap();
        assert_eq!(decode(&data).unwrap(), values);
    }

    #[test]
    fn roundtrip_needs_wrapping_accumulators() {
        // Delta from -2^62 to 2^62 is 2^63, which only exists mid-decode.
        let values = vec![i64::MIN, -(1 << 62), 1 << 62];
        let data = encode(&values).unwrap();
        assert_eq!(decode(&data).unwrap(), values);
    }

    #[test]
    fn rejects_float_payload() {
        let mut data = stream(&[0x00], 3);
        data[0] = 0x12;
        assert!(matches!(decode(&data), Err(CodecError::Format(_))));
    }

    #[test]
    fn rejects_wrapped_payload() {
        let mut data = stream(&[0x00], 3);
        data[0] = 0x19;
        let err = decode(&data).unwrap_err();
        assert!(err.to_string().contains("secondary compressor"));
    }

    #[test]
    fn rejects_declared_count_below_two() {
        assert_eq!(
            decode(&stream(&[], 1)),
            Err(CodecError::TooFewValues { count: 1 })
        );
    }

    #[test]
    fn count_below_two_wins_over_missing_preamble() {
        assert_eq!(
            decode(&[0x11, 0x01]),
            Err(CodecError::TooFewValues { count: 1 })
        );
        assert_eq!(
            decode(&[0x11, 0x00, 0xAA]),
            Err(CodecError::TooFewValues { count: 0 })
        );
    }

    #[test]
    fn short_allocation_is_reported_not_indexed() {
        struct Stingy;
        impl BufferAllocator for Stingy {
            fn allocate<T: Copy + Default>(&self, len: usize) -> Result<Vec<T>, AllocError> {
                Ok(vec![T::default(); len / 2])
            }
            fn resize<T: Copy + Default>(
                &self,
                mut buf: Vec<T>,
                new_len: usize,
            ) -> Result<Vec<T>, AllocError> {
                buf.resize(new_len, T::default());
                Ok(buf)
            }
        }

        let data = encode(&[5, 6, 7, 8]).unwrap();
        let err = decode_with(&data, &Stingy).unwrap_err();
        match err {
            CodecError::AllocationFailure(e) => assert_eq!(e.requested, 32),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_preamble_is_out_of_bounds() {
        let data = stream(&[], 2);
        assert!(matches!(
            decode(&data[..10]),
            Err(CodecError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn count_larger_than_bitstream_is_rejected_up_front() {
        // 20 elements need at least 3 bitstream bytes.
        let err = decode(&stream(&[0x00, 0x00], 20)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { .. }));
    }

    #[test]
    fn unterminated_control_code_is_out_of_bounds() {
        // 8 codes: seven zeros, then a `1` with nothing after it.
        let err = decode(&stream(&[0x01], 10)).unwrap_err();
        assert_eq!(err, CodecError::OutOfBounds { offset: 1, len: 1 });
    }

    #[test]
    fn truncated_payload_is_out_of_bounds() {
        // `11110` announces a 31-bit magnitude; only two bits follow.
        let err = decode(&stream(&[0xF8], 3)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { .. }));
    }

    #[test]
    fn six_ones_is_a_format_error() {
        let err = decode(&stream(&[0xFC], 3)).unwrap_err();
        assert!(matches!(err, CodecError::Format(_)));
    }

    #[test]
    fn allocator_failure_is_reported() {
        let data = encode(&vec![3i64; 100]).unwrap();
        let err = decode_with(&data, &BoundedAllocator::new(8 * 99)).unwrap_err();
        assert!(matches!(err, CodecError::AllocationFailure(_)));
        assert_eq!(decode_with(&data, &BoundedAllocator::new(800)).unwrap().len(), 100);
    }

    #[test]
    fn iterator_reports_classes() {
        let data = encode(&[0, 0, 0, 5, 10, 1000]).unwrap();
        let stream = Stream::parse(&data).unwrap();
        let classes: Vec<_> = stream.double_deltas().map(|r| r.unwrap()).collect();
        assert_eq!(
            classes,
            vec![
                (Bucket::Zero, 0),
                (Bucket::Tiny, 5),
                (Bucket::Zero, 0),
                (Bucket::Medium, 985),
            ]
        );
    }

    #[test]
    fn inspect_summarizes_stream() {
        let values: Vec<i64> = (0..300).map(|i| 1_700_000_000 + i * 60).collect();
        let data = encode(&values).unwrap();
        let info = inspect(&data).unwrap();
        assert_eq!(info.header.count, 300);
        assert_eq!(info.first_value, 1_700_000_000);
        assert_eq!(info.first_delta, 60);
        assert_eq!(info.encoded_len, data.len());
        assert_eq!(info.histogram.get(Bucket::Zero), 298);
        assert_eq!(info.bitstream_used, info.bitstream_len);
        assert_eq!(info.bitstream_len, 298usize.div_ceil(8));
    }
}
