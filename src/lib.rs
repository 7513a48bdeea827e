//! tscodec: delta-of-delta compression for 64-bit integer series.
//!
//! The crate provides:
//! - The bit-packed delta-of-delta codec (`codec`)
//! - Pluggable allocation for output buffers (`buffer`)
//! - Optional secondary compression of encoded streams (`compress`)
//! - High-level encode/decode APIs (`engine`)
//! - Text and file helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use tscodec::codec;
//!
//! let timestamps = [1_700_000_000, 1_700_000_060, 1_700_000_120, 1_700_000_181];
//! let encoded = codec::encode(&timestamps).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded, timestamps);
//! ```
//!
//! With secondary compression:
//!
//! ```no_run
//! use tscodec::compress::SecondaryCompression;
//! use tscodec::engine::{self, EncodeOptions};
//!
//! let values: Vec<i64> = (0..10_000).map(|i| i * 15).collect();
//! let opts = EncodeOptions::with_secondary(SecondaryCompression::Zlib { level: 9 });
//! let bytes = engine::encode_with_options(&values, &opts).unwrap();
//! assert_eq!(engine::decode(&bytes).unwrap(), values);
//! ```

pub mod buffer;
pub mod codec;
pub mod compress;
pub mod engine;
pub mod error;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use buffer::{AllocError, BoundedAllocator, BufferAllocator, HeapAllocator};
pub use error::{CodecError, CompressError};
