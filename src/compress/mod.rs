// Secondary compression on top of the delta-of-delta codec.
//
// - `secondary`: Pluggable backends (LZMA, Zlib, none, custom)
// - `frame`: Wrapping a codec stream in a backend-tagged frame and back

pub mod frame;
pub mod secondary;

pub use frame::{is_wrapped, unwrap, unwrap_in, unwrap_with, wrap};
pub use secondary::{CompressBackend, SecondaryCompression, backend_for_id};
