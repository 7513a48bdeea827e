// Wrapped frames.
//
// A codec stream can be passed through a secondary compressor. The wrapped
// form keeps the indicator byte in clear so readers can tell the two apart:
//
//   [indicator | WRAPPED][backend id][compressed(stream[1..])]
//
// Unwrapping clears the flag and puts the restored body back behind the
// indicator, giving the exact bytes the codec produced.

use std::borrow::Cow;
use std::io::{self, Write};

use log::{debug, trace};

use crate::buffer::{BufferAllocator, HeapAllocator};
use crate::codec::header::{CountWidth, Header, PayloadFlags};
use crate::codec::max_encoded_len;
use crate::error::{CodecError, CompressError};

use super::secondary::{CompressBackend, backend_for_id};

/// Bytes in front of the compressed body: indicator plus backend id.
pub const FRAME_PREFIX_LEN: usize = 2;

/// Whether `data` starts with an indicator carrying the wrapped flag.
///
/// Only looks at the first byte; a true result says nothing about the body.
pub fn is_wrapped(data: &[u8]) -> bool {
    data.first()
        .is_some_and(|&b| b & PayloadFlags::WRAPPED.bits() != 0)
}

/// Wrap an encoded stream with `backend`.
///
/// The stream is returned unchanged when the backend declines it or when
/// the wrapped form would not be smaller.
pub fn wrap(encoded: &[u8], backend: &dyn CompressBackend) -> Result<Vec<u8>, CompressError> {
    let header = Header::parse(encoded)?;
    if header.payload.contains(PayloadFlags::WRAPPED) {
        return Err(CodecError::format("stream is already wrapped").into());
    }

    let body = &encoded[1..];
    if !backend.should_compress(body) {
        debug!(
            "secondary id {}: skipped {}-byte body",
            backend.id(),
            body.len()
        );
        return Ok(encoded.to_vec());
    }

    let compressed = backend.compress(body)?;
    let wrapped_len = FRAME_PREFIX_LEN + compressed.len();
    if wrapped_len >= encoded.len() {
        debug!(
            "secondary id {}: {} -> {} bytes, keeping raw stream",
            backend.id(),
            encoded.len(),
            wrapped_len
        );
        return Ok(encoded.to_vec());
    }

    debug!(
        "secondary id {}: {} -> {} bytes",
        backend.id(),
        encoded.len(),
        wrapped_len
    );
    let mut out = Vec::with_capacity(wrapped_len);
    out.push(encoded[0] | PayloadFlags::WRAPPED.bits());
    out.push(backend.id());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Restore the raw codec stream from `data`, using the built-in backends.
///
/// A stream that is not wrapped is returned borrowed.
pub fn unwrap(data: &[u8]) -> Result<Cow<'_, [u8]>, CompressError> {
    unwrap_in(data, &HeapAllocator)
}

/// Like `unwrap`, growing the restored stream through `alloc`.
///
/// Restoring stops as soon as the stream outgrows what its count width can
/// encode or `alloc` refuses the next buffer.
pub fn unwrap_in<'a, A: BufferAllocator>(
    data: &'a [u8],
    alloc: &A,
) -> Result<Cow<'a, [u8]>, CompressError> {
    let Some((indicator, id, body)) = split_frame(data)? else {
        return Ok(Cow::Borrowed(data));
    };
    let backend = backend_for_id(id)?;
    restore(indicator, body, backend.as_ref(), alloc).map(Cow::Owned)
}

/// Restore the raw codec stream from `data` with a caller-supplied backend.
///
/// The id stored in the frame must match `backend.id()`.
pub fn unwrap_with<'a>(
    data: &'a [u8],
    backend: &dyn CompressBackend,
) -> Result<Cow<'a, [u8]>, CompressError> {
    let Some((indicator, id, body)) = split_frame(data)? else {
        return Ok(Cow::Borrowed(data));
    };
    if id != backend.id() {
        return Err(CompressError::UnknownBackend(id));
    }
    restore(indicator, body, backend, &HeapAllocator).map(Cow::Owned)
}

/// Split a wrapped frame into indicator, backend id and body.
/// `None` means the stream is raw.
fn split_frame(data: &[u8]) -> Result<Option<(u8, u8, &[u8])>, CompressError> {
    let &indicator = data.first().ok_or(CodecError::OutOfBounds {
        offset: 0,
        len: 0,
    })?;
    if indicator & PayloadFlags::WRAPPED.bits() == 0 {
        return Ok(None);
    }
    match data {
        [_, id, body @ ..] => Ok(Some((indicator, *id, body))),
        _ => Err(CodecError::OutOfBounds {
            offset: data.len(),
            len: data.len(),
        }
        .into()),
    }
}

fn restore<A: BufferAllocator>(
    indicator: u8,
    body: &[u8],
    backend: &dyn CompressBackend,
    alloc: &A,
) -> Result<Vec<u8>, CompressError> {
    let width = CountWidth::from_indicator(indicator)?;
    let limit = max_encoded_len(width, width.max_count());
    let mut sink = StreamSink::new(alloc, limit, body.len())?;
    sink.write_all(&[indicator & !PayloadFlags::WRAPPED.bits()])?;

    let outcome = backend.decompress(body, &mut sink);
    if let Some(refused) = sink.refused.take() {
        return Err(refused);
    }
    outcome?;

    let restored = sink.finish()?;
    trace!(
        "secondary id {}: restored {} -> {} bytes",
        backend.id(),
        body.len(),
        restored.len() - 1
    );
    Ok(restored)
}

/// Output of a backend's `decompress`: capped at `limit` bytes and grown
/// through the caller's allocator.
struct StreamSink<'a, A: BufferAllocator> {
    alloc: &'a A,
    buf: Vec<u8>,
    len: usize,
    limit: usize,
    /// Why the last write was refused; backends only see an `io::Error`.
    refused: Option<CompressError>,
}

impl<'a, A: BufferAllocator> StreamSink<'a, A> {
    fn new(alloc: &'a A, limit: usize, packed_len: usize) -> Result<Self, CompressError> {
        // First guess: twice the packed size. A budget too tight for the
        // guess starts empty and grows to exact sizes instead.
        let guess = packed_len.saturating_mul(2).clamp(64, limit);
        let buf = alloc
            .allocate(guess)
            .or_else(|_| alloc.allocate(0))
            .map_err(CodecError::from)?;
        Ok(Self {
            alloc,
            buf,
            len: 0,
            limit,
            refused: None,
        })
    }

    /// Make room for `needed` bytes, doubling where the limit allows.
    fn grow(&mut self, needed: usize) -> Result<(), CompressError> {
        if needed > self.limit {
            return Err(CompressError::Decompress(format!(
                "restored stream exceeds {} bytes, the most its count width can encode",
                self.limit
            )));
        }
        let target = needed.max(self.buf.len().saturating_mul(2)).min(self.limit);
        let mut grown = match self.alloc.allocate::<u8>(target) {
            Ok(buf) => Ok(buf),
            Err(_) if target > needed => self.alloc.allocate::<u8>(needed),
            Err(e) => Err(e),
        }
        .map_err(CodecError::from)?;
        if grown.len() < needed {
            return Err(CompressError::Decompress(format!(
                "allocator returned {} of {needed} bytes",
                grown.len()
            )));
        }
        grown[..self.len].copy_from_slice(&self.buf[..self.len]);
        self.buf = grown;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, CompressError> {
        Ok(self.alloc.resize(self.buf, self.len).map_err(CodecError::from)?)
    }
}

impl<A: BufferAllocator> Write for StreamSink<'_, A> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let end = self.len + data.len();
        if end > self.buf.len() {
            if let Err(e) = self.grow(end) {
                let msg = e.to_string();
                self.refused = Some(e);
                return Err(io::Error::other(msg));
            }
        }
        self.buf[self.len..end].copy_from_slice(data);
        self.len = end;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
