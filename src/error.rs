// Error types shared by the codec core.
//
// Every variant is terminal for the call that produced it: encode and decode
// never hand back a partially written buffer.

use thiserror::Error;

use crate::buffer::AllocError;

/// Errors raised by the bit cursor and the delta-of-delta codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The sequence is longer than a 3-byte count can describe.
    #[error("sequence of {count} values exceeds the maximum of {max}", max = crate::codec::header::MAX_COUNT)]
    SizeOverflow { count: usize },

    /// Fewer than two values: the preamble needs a first value and a first delta.
    #[error("at least two values are required, got {count}")]
    TooFewValues { count: usize },

    /// Unrecognized version, width class or payload flag, or a malformed control code.
    #[error("invalid format: {0}")]
    Format(String),

    /// A delta or double-delta cannot be represented losslessly in 64 bits.
    #[error("delta at index {index} does not fit in a signed 64-bit payload")]
    TruncationRisk { index: usize },

    /// The bit cursor tried to read or write past the end of its buffer.
    #[error("bit cursor out of bounds at byte {offset} of {len}")]
    OutOfBounds { offset: usize, len: usize },

    /// The allocation strategy could not satisfy a request.
    #[error(transparent)]
    AllocationFailure(#[from] AllocError),
}

impl CodecError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

// ---------------------------------------------------------------------------
// Secondary compression errors
// ---------------------------------------------------------------------------

/// Errors raised while wrapping, unwrapping or decoding a wrapped stream.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The codec rejected the stream or the values.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A compressor backend failed while compressing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No backend is registered for the id stored in a wrapped frame.
    #[error("unknown secondary compressor id {0}")]
    UnknownBackend(u8),

    /// The backend exists but was compiled out.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The compressed body could not be restored.
    #[error("secondary decompression failed: {0}")]
    Decompress(String),
}
