// Delta-of-delta integer codec.
//
// # Modules
//
// - `bits`: Bounds-checked bit cursors (MSB-first within a byte)
// - `bucket`: The six double-delta size classes and their control codes
// - `header`: Indicator byte and element count
// - `encoder`: Sequence to bytes
// - `decoder`: Bytes to sequence, plus stream inspection
//
// The codec core is silent: it never logs, and every failure comes back as a
// `CodecError` with no partial output.

pub mod bits;
pub mod bucket;
pub mod decoder;
pub mod encoder;
pub mod header;

pub use bits::{BitReader, BitWriter};
pub use bucket::{Bucket, BucketHistogram};
pub use decoder::{DoubleDeltaIter, Stream, StreamInfo, decode, decode_with, inspect};
pub use encoder::{EncodeOutput, encode, encode_detailed, encode_with, max_encoded_len};
pub use header::{CountWidth, Header, MAX_COUNT, PayloadFlags};
